//! WebSocket file client.
//!
//! [`FerryClient`] drives the three operations against a fileferry server:
//! chunked uploads, sharded downloads, and health checks. [`probe::probe_loop`]
//! wraps the health check in a polling loop that rides out transient
//! failures.

mod client;
mod config;
mod conn;
mod download;
pub mod probe;
mod upload;

pub use client::FerryClient;
pub use config::ClientConfig;

use fileferry_protocol::codes::ErrorCode;

/// Errors from client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transfer(#[from] fileferry_transfer::TransferError),

    #[error("file too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("upload rejected: {0}")]
    Rejected(String),

    #[error("server error {code:?}: {message}")]
    Remote { code: ErrorCode, message: String },

    #[error("connection closed")]
    Closed,

    #[error("request timed out")]
    Timeout,

    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Whether the probe loop may keep polling after this error. Transport
    /// hiccups and the transient slice of the remote code space are
    /// survivable; everything else is fatal.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Ws(_) | ClientError::Closed | ClientError::Timeout => true,
            ClientError::Remote { code, .. } => code.is_transient(),
            _ => false,
        }
    }
}
