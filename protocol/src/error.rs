//! Error types for envelope encoding and decoding

use thiserror::Error;

/// Errors that can occur while handling a wire envelope
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame was not valid JSON or did not match the envelope shape
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Envelope carried an empty event name
    #[error("Envelope event name is empty")]
    EmptyEvent,
}

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
