//! Resource usage snapshots

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Memory counters in bytes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub working_set_bytes: u64,
    pub private_bytes: u64,
    pub heap_bytes: u64,
}

/// Thread counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadCounts {
    pub total: u32,
    pub busy: u32,
    pub available: u32,
}

/// Periodic resource usage snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory: MemoryUsage,
    /// Collector-specific counters (e.g. per-generation collection counts)
    pub collector_counters: BTreeMap<String, u64>,
    pub threads: ThreadCounts,
}

impl PerformanceEntry {
    pub fn new(cpu_percent: f64, memory: MemoryUsage, threads: ThreadCounts) -> Self {
        Self {
            timestamp: Utc::now(),
            cpu_percent,
            memory,
            collector_counters: BTreeMap::new(),
            threads,
        }
    }

    pub fn with_counter(mut self, name: impl Into<String>, value: u64) -> Self {
        self.collector_counters.insert(name.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_serialize_as_map() {
        let entry = PerformanceEntry::new(12.5, MemoryUsage::default(), ThreadCounts::default())
            .with_counter("gen0", 7)
            .with_counter("gen1", 2);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["cpuPercent"], 12.5);
        assert_eq!(json["collectorCounters"]["gen0"], 7);
        assert_eq!(json["collectorCounters"]["gen1"], 2);
        assert_eq!(json["memory"]["workingSetBytes"], 0);
    }
}
