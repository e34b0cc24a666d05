//! Crate-level error types

use std::any::Any;

use thiserror::Error;

/// Result alias used throughout the collector
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing or running the collector
#[derive(Debug, Error)]
pub enum Error {
    /// A circular store was configured with zero capacity
    #[error("invalid capacity for {name}: capacity must be greater than zero")]
    InvalidCapacity { name: &'static str },

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Socket or filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded as JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
