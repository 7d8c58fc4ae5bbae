//! Client side of the upload stream.

use std::io::Read;
use std::path::Path;

use chrono::Utc;

use fileferry_protocol::constants::{MAX_UPLOAD_SIZE, MessageType};
use fileferry_protocol::envelope::Message;
use fileferry_protocol::messages::{FileInfo, StatusCode, UploadStatus};
use fileferry_protocol::wire::BinaryHeader;
use fileferry_transfer::{ChunkReader, TransferStats};

use crate::client::FerryClient;
use crate::conn::Incoming;
use crate::ClientError;

impl FerryClient {
    /// Uploads a byte source: the info header, the content chunks, then the
    /// stream close. Blocks until the server's terminal status arrives; a
    /// non-Ok status surfaces as [`ClientError::Rejected`].
    pub async fn upload(
        &mut self,
        file_id: &str,
        file_type: &str,
        source: impl Read,
    ) -> Result<(UploadStatus, TransferStats), ClientError> {
        let started_at = Utc::now();
        let id = Self::new_id("up");

        let info = FileInfo {
            file_id: file_id.into(),
            file_type: file_type.into(),
        };
        self.conn
            .send_envelope(&Message::new(&id, MessageType::UploadInfo, Some(&info))?)
            .await?;

        let mut reader = ChunkReader::new(source, self.config.chunk_size)?;
        loop {
            let frame_offset = reader.offset();
            match reader.next_chunk()? {
                Some(chunk) => {
                    let header = BinaryHeader {
                        id: id.clone(),
                        offset: frame_offset,
                    };
                    self.conn.send_frame(&header, &chunk).await?;
                }
                None => break,
            }
        }
        let sent = reader.offset();
        // The transfer window closes with the last content frame; waiting
        // for the terminal status is not counted.
        let stats = TransferStats {
            started_at,
            finished_at: Utc::now(),
        };

        // Closing the send half is the only end-of-upload marker.
        self.conn
            .send_envelope(&Message::new::<()>(&id, MessageType::StreamEnd, None)?)
            .await?;

        let status = self.await_upload_status(&id).await?;
        tracing::info!(
            %file_id,
            bytes = sent,
            duration_ms = stats.duration_ms(),
            "upload finished"
        );
        Ok((status, stats))
    }

    /// Uploads a file from disk, using its file name as the stored id.
    ///
    /// Fails fast on files over [`MAX_UPLOAD_SIZE`] without opening the
    /// stream.
    pub async fn upload_file(
        &mut self,
        path: impl AsRef<Path>,
        file_type: &str,
    ) -> Result<(UploadStatus, TransferStats), ClientError> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        if size > MAX_UPLOAD_SIZE as u64 {
            return Err(ClientError::TooLarge {
                size,
                limit: MAX_UPLOAD_SIZE as u64,
            });
        }

        let file_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Config(format!("path has no file name: {}", path.display())))?
            .to_string();

        let file = std::fs::File::open(path)?;
        self.upload(&file_id, file_type, file).await
    }

    async fn await_upload_status(&mut self, id: &str) -> Result<UploadStatus, ClientError> {
        loop {
            match self.conn.recv(self.config.request_timeout).await? {
                Incoming::Envelope(msg) if msg.id == id => {
                    if let Some(err) = &msg.error {
                        return Err(ClientError::Remote {
                            code: err.code,
                            message: err.message.clone(),
                        });
                    }
                    if msg.msg_type != MessageType::UploadStatus {
                        return Err(ClientError::Protocol(format!(
                            "unexpected reply type {:?}",
                            msg.msg_type
                        )));
                    }
                    let status: UploadStatus = msg
                        .parse_payload()?
                        .ok_or_else(|| ClientError::Protocol("upload status without payload".into()))?;
                    if status.code != StatusCode::Ok {
                        return Err(ClientError::Rejected(status.message));
                    }
                    return Ok(status);
                }
                Incoming::Envelope(msg) => {
                    tracing::warn!(id = %msg.id, "reply for unknown request, dropping");
                }
                Incoming::Binary(header, _) => {
                    tracing::warn!(id = %header.id, "unexpected binary frame during upload");
                }
            }
        }
    }
}
