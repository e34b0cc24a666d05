//! Retention configuration

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default number of records retained per kind
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default ceiling for captured request/response bodies
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Retention options for the indexed collection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Network exchanges retained
    pub network_capacity: usize,

    /// Log lines retained
    pub console_capacity: usize,

    /// Resource snapshots retained
    pub performance_capacity: usize,

    /// Maximum captured body size in bytes (enforced by producers)
    pub max_body_bytes: usize,

    /// The network index is rebuilt once it holds more than
    /// `index_rebuild_factor * network_capacity` ids
    pub index_rebuild_factor: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            network_capacity: DEFAULT_CAPACITY,
            console_capacity: DEFAULT_CAPACITY,
            performance_capacity: DEFAULT_CAPACITY,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            index_rebuild_factor: 2,
        }
    }
}

impl StoreConfig {
    /// Use the same capacity for every historized kind
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            network_capacity: capacity,
            console_capacity: capacity,
            performance_capacity: capacity,
            ..Default::default()
        }
    }

    pub fn network_capacity(mut self, capacity: usize) -> Self {
        self.network_capacity = capacity;
        self
    }

    pub fn console_capacity(mut self, capacity: usize) -> Self {
        self.console_capacity = capacity;
        self
    }

    pub fn performance_capacity(mut self, capacity: usize) -> Self {
        self.performance_capacity = capacity;
        self
    }

    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Set the index rebuild factor (clamped to at least 1)
    pub fn index_rebuild_factor(mut self, factor: usize) -> Self {
        self.index_rebuild_factor = factor.max(1);
        self
    }

    /// Check the configuration before building stores from it
    pub fn validate(&self) -> Result<()> {
        if self.index_rebuild_factor == 0 {
            return Err(Error::InvalidConfig(
                "index_rebuild_factor must be at least 1".into(),
            ));
        }
        // Zero capacities are reported by the stores themselves
        Ok(())
    }
}
