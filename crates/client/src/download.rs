//! Client side of the download stream.

use std::path::Path;

use chrono::Utc;

use fileferry_protocol::constants::MessageType;
use fileferry_protocol::envelope::Message;
use fileferry_protocol::messages::FileRequest;
use fileferry_transfer::TransferStats;

use crate::client::FerryClient;
use crate::conn::Incoming;
use crate::ClientError;

impl FerryClient {
    /// Downloads a stored file, accumulating shards until the server closes
    /// the stream. Any error discards the partial payload.
    pub async fn download(
        &mut self,
        filename: &str,
    ) -> Result<(Vec<u8>, TransferStats), ClientError> {
        let started_at = Utc::now();
        let id = Self::new_id("dl");

        let req = FileRequest {
            filename: filename.into(),
        };
        self.conn
            .send_envelope(&Message::new(&id, MessageType::DownloadRequest, Some(&req))?)
            .await?;

        let mut payload = Vec::new();
        let mut shards = 0usize;
        loop {
            match self.conn.recv(self.config.request_timeout).await? {
                Incoming::Binary(header, piece) => {
                    if header.id != id {
                        tracing::warn!(id = %header.id, "binary frame for wrong stream, dropping");
                        continue;
                    }
                    shards += 1;
                    payload.extend_from_slice(&piece);
                    tracing::debug!(shards, bytes = payload.len(), "download progress");
                }
                Incoming::Envelope(msg) if msg.id == id => {
                    if let Some(err) = &msg.error {
                        return Err(ClientError::Remote {
                            code: err.code,
                            message: err.message.clone(),
                        });
                    }
                    match msg.msg_type {
                        // Stream close is the only end-of-download marker.
                        MessageType::StreamEnd => break,
                        other => {
                            return Err(ClientError::Protocol(format!(
                                "unexpected reply type {other:?}"
                            )));
                        }
                    }
                }
                Incoming::Envelope(msg) => {
                    tracing::warn!(id = %msg.id, "reply for unknown request, dropping");
                }
            }
        }

        let stats = TransferStats {
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            %filename,
            shards,
            bytes = payload.len(),
            duration_ms = stats.duration_ms(),
            "download finished"
        );
        Ok((payload, stats))
    }

    /// Downloads a stored file to disk. The destination is written once,
    /// after the whole payload has arrived.
    pub async fn download_to_file(
        &mut self,
        filename: &str,
        dest: impl AsRef<Path>,
    ) -> Result<TransferStats, ClientError> {
        let (payload, stats) = self.download(filename).await?;
        std::fs::write(dest, &payload)?;
        Ok(stats)
    }
}
