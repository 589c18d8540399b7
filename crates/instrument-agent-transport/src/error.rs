//! Transport errors.

use thiserror::Error;

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Connection channel closed")]
    ChannelClosed,
}
