//! Statistics and metrics for the collector server

pub mod metrics;

pub use metrics::{ServerStats, ServerStatsSnapshot};
