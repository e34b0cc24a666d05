//! Event bus for record fan-out
//!
//! Producers publish records without knowing who consumes them. Handlers
//! are registered per [`RecordKind`](crate::record::RecordKind); each publish
//! runs a snapshot of the handlers registered at that moment.
//!
//! ```text
//!   Collector::add_*() ──► publish_async(record)
//!                                │
//!                     ┌──────────┼──────────┐
//!                     ▼          ▼          ▼
//!                 handler    handler    registry bridge ──► clients
//! ```
//!
//! There is no queueing and no backpressure: a handler that panics is logged
//! and skipped, and asynchronous deliveries carry no ordering guarantee
//! relative to one another.

pub mod event_bus;
pub mod subscription;

pub use event_bus::EventBus;
pub use subscription::{Subscription, SubscriptionId};
