//! Streaming client abstraction

use std::sync::Arc;

use super::error::ClientError;

/// Unique streaming client ID
pub type ClientId = u64;

/// A live connection enrolled for push delivery
///
/// `send` must not block on the network: implementations queue the payload
/// (or fail) and let their connection task do the actual write.
pub trait StreamClient: Send + Sync {
    fn id(&self) -> ClientId;

    /// Queue one serialized envelope for delivery
    fn send(&self, payload: &Arc<str>) -> Result<(), ClientError>;

    /// Ask the connection to close; must be harmless if it already has
    fn close(&self);
}
