//! Broadcast registry for live streaming clients
//!
//! The registry tracks every connected streaming client and pushes each
//! published record to all of them as a JSON envelope.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<BroadcastRegistry>
//!                     ┌─────────────────────────┐
//!                     │ clients: HashMap<Id,    │
//!                     │   Arc<dyn StreamClient> │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [EventBus]              [WsClient]              [WsClient]
//!    publish_async()         queue.recv()            queue.recv()
//!         │                       │                       │
//!         └──► registry.broadcast()──► send() ──► WebSocket
//! ```
//!
//! # Shared Payloads
//!
//! An envelope is serialized once per broadcast into an `Arc<str>`; every
//! client queues a reference-counted handle to the same string.

pub mod client;
pub mod envelope;
pub mod error;
pub mod store;

pub use client::{ClientId, StreamClient};
pub use envelope::Envelope;
pub use error::ClientError;
pub use store::{BroadcastOutcome, BroadcastRegistry};
