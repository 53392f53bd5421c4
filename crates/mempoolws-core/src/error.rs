//! Feed-level error types.

use thiserror::Error;

/// Errors that can occur while talking to the feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// WebSocket connect/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,

    /// The configured endpoint is not a usable WebSocket URL.
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A frame could not be (de)serialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl FeedError {
    /// Returns `true` for transport failures: the only class that triggers
    /// the offline/retry cycle.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::WebSocket(_) | Self::Closed)
    }
}
