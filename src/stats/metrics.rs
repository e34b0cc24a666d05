//! Server-wide counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the listener and the broadcast registry
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Total connections accepted
    pub connections_accepted: AtomicU64,

    /// Connections refused because the connection limit was reached
    pub connections_rejected: AtomicU64,

    /// Currently open connections (REST and streaming)
    pub active_connections: AtomicU64,

    /// Streaming clients ever registered
    pub clients_registered: AtomicU64,

    /// Streaming clients removed after a failed send
    pub clients_pruned: AtomicU64,

    /// Envelopes handed to the registry for fan-out
    pub envelopes_broadcast: AtomicU64,

    /// Per-client envelope deliveries
    pub deliveries: AtomicU64,

    /// Per-client envelopes dropped because the client queue was full
    pub deliveries_dropped: AtomicU64,
}

impl ServerStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn decr(counter: &AtomicU64) {
        counter.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of every counter
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            clients_registered: self.clients_registered.load(Ordering::Relaxed),
            clients_pruned: self.clients_pruned.load(Ordering::Relaxed),
            envelopes_broadcast: self.envelopes_broadcast.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            deliveries_dropped: self.deliveries_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ServerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    pub connections_accepted: u64,
    pub connections_rejected: u64,
    pub active_connections: u64,
    pub clients_registered: u64,
    pub clients_pruned: u64,
    pub envelopes_broadcast: u64,
    pub deliveries: u64,
    pub deliveries_dropped: u64,
}
