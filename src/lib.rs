//! In-process telemetry collector
//!
//! Captures observability records produced inside a host process (HTTP
//! exchanges, log lines, resource snapshots and a process-identity snapshot),
//! keeps a bounded recent history of each kind, and serves that history over
//! HTTP and as a live WebSocket push.
//!
//! # Architecture
//!
//! ```text
//!   producer ──► Collector::add_*()
//!                    │
//!                    ├──► IndexedCollection   (bounded per-kind history)
//!                    │          ▲
//!                    │          │ REST reads
//!                    ▼          │
//!               EventBus ──► BroadcastRegistry ──► WebSocket clients
//!                               (TelemetryServer)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use telemetry_collector::{Collector, ConsoleEntry, LogLevel, ServerConfig, StoreConfig, TelemetryServer};
//!
//! # async fn run() -> telemetry_collector::Result<()> {
//! let collector = Collector::new(StoreConfig::default())?;
//! let server = TelemetryServer::new(ServerConfig::default(), &collector);
//!
//! collector.add_log(ConsoleEntry::new(LogLevel::Information, "app", "started"));
//!
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod collector;
pub mod error;
pub mod record;
pub mod registry;
pub mod server;
pub mod stats;
pub mod store;

pub use bus::{EventBus, Subscription};
pub use collector::Collector;
pub use error::{Error, Result};
pub use record::{
    ApplicationInfo, ConsoleEntry, Entry, LogLevel, NetworkEntry, PerformanceEntry, Record,
    RecordKind,
};
pub use registry::{BroadcastRegistry, Envelope};
pub use server::{ServerConfig, TelemetryServer};
pub use store::{CircularStore, IndexedCollection, StoreConfig};
