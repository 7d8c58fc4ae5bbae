//! WebSocket file server.
//!
//! Accepts client connections and serves the three operations: chunked
//! uploads into a [`store::FileStore`], sharded downloads out of it, and
//! health checks against a [`health::HealthRegistry`].

mod connection;
pub mod health;
pub mod server;
pub mod session;
pub mod store;

pub use health::HealthRegistry;
pub use server::{FerryServer, ServerConfig};
pub use session::SessionError;
pub use store::{DiskStore, FileStore, StoreError};

/// Errors from running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}
