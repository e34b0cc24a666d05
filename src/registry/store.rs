//! Broadcast registry implementation
//!
//! Tracks the live set of streaming clients and fans envelopes out to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::{EventBus, Subscription};
use crate::record::RecordKind;
use crate::stats::ServerStats;

use super::client::{ClientId, StreamClient};
use super::envelope::Envelope;
use super::error::ClientError;

/// Result of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Clients the envelope was queued for
    pub delivered: usize,
    /// Clients that skipped the envelope because their queue was full
    pub dropped: usize,
    /// Clients removed because their connection was closed
    pub removed: usize,
}

/// Registry of all live streaming clients
///
/// The client map has its own lock, and it is never held across a send: a
/// broadcast copies the client list first, so slow clients cannot block
/// `register`/`unregister` or each other.
pub struct BroadcastRegistry {
    clients: Mutex<HashMap<ClientId, Arc<dyn StreamClient>>>,
    next_client_id: AtomicU64,
    stats: Arc<ServerStats>,
}

impl BroadcastRegistry {
    /// Create an empty registry with its own counters
    pub fn new() -> Self {
        Self::with_stats(Arc::new(ServerStats::new()))
    }

    /// Create an empty registry reporting into shared counters
    pub fn with_stats(stats: Arc<ServerStats>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Allocate an id for a client about to be registered
    pub fn next_client_id(&self) -> ClientId {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Enroll a client; returns false if its id is already registered
    pub fn register(&self, client: Arc<dyn StreamClient>) -> bool {
        let id = client.id();
        let count = {
            let mut clients = self.clients.lock();
            if clients.contains_key(&id) {
                return false;
            }
            clients.insert(id, client);
            clients.len()
        };

        ServerStats::incr(&self.stats.clients_registered);
        tracing::info!(client_id = id, clients = count, "Streaming client registered");
        true
    }

    /// Remove a client; returns false if it was not registered
    pub fn unregister(&self, id: ClientId) -> bool {
        let removed = self.clients.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(client_id = id, "Streaming client unregistered");
        }
        removed
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Serialize `envelope` once and send it to every registered client
    pub fn broadcast(&self, envelope: &Envelope) -> BroadcastOutcome {
        match envelope.to_payload() {
            Ok(payload) => self.broadcast_payload(&payload),
            Err(e) => {
                tracing::warn!(
                    kind = %envelope.record_kind(),
                    error = %e,
                    "Failed to serialize envelope"
                );
                BroadcastOutcome::default()
            }
        }
    }

    /// Send an already serialized envelope to every registered client
    ///
    /// A closed client is removed and the loop continues; a client with a
    /// full queue misses this envelope but stays registered.
    pub fn broadcast_payload(&self, payload: &Arc<str>) -> BroadcastOutcome {
        let snapshot: Vec<Arc<dyn StreamClient>> = self.clients.lock().values().cloned().collect();
        let mut outcome = BroadcastOutcome::default();

        for client in snapshot {
            match client.send(payload) {
                Ok(()) => outcome.delivered += 1,
                Err(ClientError::QueueFull) => {
                    outcome.dropped += 1;
                    tracing::warn!(client_id = client.id(), "Client lagging, envelope dropped");
                }
                Err(ClientError::Closed) => {
                    if self.unregister(client.id()) {
                        outcome.removed += 1;
                        ServerStats::incr(&self.stats.clients_pruned);
                    }
                    tracing::debug!(client_id = client.id(), "Client send failed, removed");
                }
            }
        }

        ServerStats::incr(&self.stats.envelopes_broadcast);
        ServerStats::add(&self.stats.deliveries, outcome.delivered as u64);
        ServerStats::add(&self.stats.deliveries_dropped, outcome.dropped as u64);
        outcome
    }

    /// Remove and close every client
    ///
    /// Returns the number of clients closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<dyn StreamClient>> =
            self.clients.lock().drain().map(|(_, client)| client).collect();

        for client in &drained {
            client.close();
        }

        if !drained.is_empty() {
            tracing::info!(clients = drained.len(), "Closed all streaming clients");
        }
        drained.len()
    }

    /// Forward every record published on `bus` to the registered clients
    ///
    /// Subscribes once per record kind. The returned subscriptions detach the
    /// registry again when disposed.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Vec<Subscription> {
        RecordKind::ALL
            .iter()
            .map(|&kind| {
                let registry = Arc::clone(self);
                bus.subscribe_kind(kind, move |record| {
                    registry.broadcast(&Envelope::new(record.clone()));
                })
            })
            .collect()
    }
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BroadcastRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastRegistry")
            .field("clients", &self.client_count())
            .finish()
    }
}
