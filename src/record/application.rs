//! Process identity snapshot

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the host process
///
/// Only the latest snapshot is kept; setting a new one replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInfo {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub runtime: String,
    pub process_id: u32,
    pub os: String,
    pub architecture: String,
    pub cpu_count: usize,
    pub started_at: DateTime<Utc>,
    pub captured_at: DateTime<Utc>,
    pub properties: BTreeMap<String, String>,
}

impl ApplicationInfo {
    /// Capture identity details of the current process
    pub fn capture(name: impl Into<String>, version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            version: version.into(),
            environment: "production".to_owned(),
            runtime: "rust".to_owned(),
            process_id: std::process::id(),
            os: std::env::consts::OS.to_owned(),
            architecture: std::env::consts::ARCH.to_owned(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            started_at: now,
            captured_at: now,
            properties: BTreeMap::new(),
        }
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
