//! # Event Error Types
//!
//! Errors inside the hub. None of these reach a publisher: a failed send
//! ends one observer's connection and nothing else.

use thiserror::Error;

pub type EventResult<T> = Result<T, EventError>;

#[derive(Debug, Error)]
pub enum EventError {
    /// The event could not be encoded as JSON.
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// The observer's socket rejected a frame.
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] axum::Error),
}
