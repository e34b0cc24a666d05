//! Network and streaming server
//!
//! A tokio accept loop hands every socket to its own task, which serves HTTP/1
//! or HTTP/2 (with upgrades) through an axum router:
//!
//! ```text
//!   TcpListener ──► connection task ──► Router
//!                                         ├── /api/...      REST reads and clears
//!                                         ├── /ws           upgrade → WsClient → BroadcastRegistry
//!                                         └── fallback      static dir or 404
//! ```
//!
//! While serving, the registry is attached to the collector's event bus so
//! every ingested record is pushed to all streaming clients.

pub mod auth;
pub mod config;
pub mod listener;
pub mod response;
pub mod routes;
pub mod state;
pub mod websocket;

pub use config::ServerConfig;
pub use listener::TelemetryServer;
pub use response::{ApiError, ApiMessage, PageQuery, PageResponse};
pub use routes::{router, StatusResponse};
pub use state::AppState;
pub use websocket::WsClient;
