//! Shared request state

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::registry::BroadcastRegistry;
use crate::server::config::ServerConfig;
use crate::stats::ServerStats;
use crate::store::IndexedCollection;

/// State handed to every route handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub collection: Arc<IndexedCollection>,
    pub registry: Arc<BroadcastRegistry>,
    pub stats: Arc<ServerStats>,
    pub started_at: Instant,
    /// Cancelled when the server stops; streaming connections watch it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        collection: Arc<IndexedCollection>,
        registry: Arc<BroadcastRegistry>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            collection,
            stats: Arc::clone(registry.stats()),
            registry,
            started_at: Instant::now(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the shutdown token with one owned by the server
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Replace the start time used for uptime reporting
    pub fn with_started_at(mut self, started_at: Instant) -> Self {
        self.started_at = started_at;
        self
    }
}
