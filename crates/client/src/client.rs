use crate::conn::Connection;
use crate::{ClientConfig, ClientError};

/// A client connected to one fileferry server.
///
/// Operations run sequentially on the connection; each one correlates its
/// replies by envelope id.
pub struct FerryClient {
    pub(crate) conn: Connection,
    pub(crate) config: ClientConfig,
}

impl FerryClient {
    /// Connects with the default configuration.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        Self::connect_with(url, ClientConfig::default()).await
    }

    /// Connects with an explicit configuration.
    pub async fn connect_with(url: &str, config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let conn = Connection::connect(url).await?;
        tracing::debug!(%url, "connected");
        Ok(Self { conn, config })
    }

    /// Gracefully closes the connection.
    pub async fn close(&self) {
        self.conn.close().await;
    }

    pub(crate) fn new_id(prefix: &str) -> String {
        format!("{prefix}-{}", uuid::Uuid::new_v4())
    }
}
