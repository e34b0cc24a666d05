//! Registry error types
//!
//! Error types for delivering envelopes to streaming clients.

use thiserror::Error;

/// Error returned by [`StreamClient::send`](super::StreamClient::send)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The client's connection is gone; it should be removed
    #[error("client connection closed")]
    Closed,
    /// The client is not keeping up; this envelope is dropped for it
    #[error("client send queue full")]
    QueueFull,
}
