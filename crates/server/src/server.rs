//! The WebSocket file server.
//!
//! Listens on a TCP port, upgrades connections to WebSocket, and serves
//! each one on its own task until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::accept_async_with_config;
use tokio_util::sync::CancellationToken;

use fileferry_protocol::constants::{MAX_UPLOAD_SIZE, SHARD_SIZE, WS_MAX_MESSAGE_SIZE};

use crate::ServerError;
use crate::connection::{self, ConnLimits};
use crate::health::HealthRegistry;
use crate::store::FileStore;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Hard cap on a single upload payload.
    pub max_upload_size: usize,
    /// Download shard size; every shard is this long except possibly the last.
    pub shard_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 1313,
            max_upload_size: MAX_UPLOAD_SIZE,
            shard_size: SHARD_SIZE,
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ServerError> {
        if self.max_upload_size == 0 {
            return Err(ServerError::Config("max_upload_size must be nonzero".into()));
        }
        if self.shard_size == 0 {
            return Err(ServerError::Config("shard_size must be nonzero".into()));
        }
        Ok(())
    }
}

/// The file server. Connections run concurrently; each gets its own
/// routing task and sessions.
pub struct FerryServer {
    config: ServerConfig,
    store: Arc<dyn FileStore>,
    health: Arc<HealthRegistry>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl FerryServer {
    /// Creates a new server over the given store.
    pub fn new(config: ServerConfig, store: Arc<dyn FileStore>) -> Result<Arc<Self>, ServerError> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            store,
            health: Arc::new(HealthRegistry::new()),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        }))
    }

    /// The health registry served by this server's health checks.
    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Gracefully shuts down the server and all connection tasks.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the server until cancellation.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let addr: SocketAddr = ([0, 0, 0, 0], self.config.port).into();
        let listener = TcpListener::bind(addr).await?;

        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!("file server listening on {local_addr}");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                    tracing::error!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Upgrades one TCP connection to WebSocket and serves it to completion.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        // Size limits matching the protocol constants.
        let mut ws_config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let ws_stream = accept_async_with_config(stream, Some(ws_config)).await?;
        tracing::info!(%peer_addr, "WebSocket connection established");

        let limits = ConnLimits {
            max_upload_size: self.config.max_upload_size,
            shard_size: self.config.shard_size,
        };
        connection::serve(
            ws_stream,
            peer_addr,
            Arc::clone(&self.store),
            Arc::clone(&self.health),
            limits,
            self.cancel.child_token(),
        )
        .await
    }
}
