use std::time::Duration;

use fileferry_protocol::constants::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, WS_REQUEST_TIMEOUT};

use crate::ClientError;

/// Client tuning knobs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upload chunk size in bytes.
    pub chunk_size: usize,
    /// Timeout for a single request-response exchange and for each frame of
    /// a download stream.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout: WS_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ClientError::Config(format!(
                "chunk_size {} out of range 1..={MAX_CHUNK_SIZE}",
                self.chunk_size
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ClientError::Config("request_timeout must be nonzero".into()));
        }
        Ok(())
    }
}
