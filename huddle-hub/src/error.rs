//! Error types for the realtime hub

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The coordination loop has stopped and no longer accepts commands
    #[error("Hub is closed")]
    HubClosed,

    #[error("Failed to decode inbound frame: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode outbound frame: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, Error>;
