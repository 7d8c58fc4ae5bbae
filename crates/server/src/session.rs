//! Server-side transfer sessions, independent of the transport.
//!
//! [`receive_upload`] consumes a stream of upload frames and hands the
//! complete payload to the store in a single call. [`send_download`] slices
//! a payload into fixed-size shards and pushes them into a bounded channel;
//! closing the channel is the only end-of-stream marker the receiver sees.

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;

use fileferry_protocol::codes::ErrorCode;
use fileferry_protocol::messages::{Chunk, Shard, UploadStatus};
use fileferry_transfer::{Accumulator, TransferError};

use crate::store::{FileStore, StoreError};

/// Errors terminating a transfer session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("storage: {0}")]
    Storage(#[from] StoreError),

    #[error("transport: {0}")]
    Transport(String),
}

impl SessionError {
    /// Wire error code reported to the peer.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::Protocol(_) => ErrorCode::InvalidArgument,
            SessionError::Transfer(TransferError::PayloadTooLarge { .. }) => {
                ErrorCode::InvalidArgument
            }
            SessionError::Transfer(_) => ErrorCode::Internal,
            SessionError::Storage(StoreError::NotFound(_)) => ErrorCode::NotFound,
            SessionError::Storage(StoreError::InvalidName(_)) => ErrorCode::InvalidArgument,
            SessionError::Storage(_) => ErrorCode::Internal,
            SessionError::Transport(_) => ErrorCode::Unavailable,
        }
    }
}

/// Frame-order states of an upload stream. The terminal outcomes are the
/// function's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadState {
    AwaitInfo,
    Receiving,
}

/// Drives one upload stream to completion.
///
/// The first frame must be the file info header; every later frame must be
/// content. The payload accumulates under `max_size`; the store is called
/// exactly once, after the stream ends cleanly. Any error discards the
/// partial payload without touching the store.
pub async fn receive_upload<S>(
    mut frames: S,
    store: &dyn FileStore,
    max_size: usize,
) -> Result<UploadStatus, SessionError>
where
    S: Stream<Item = Result<Chunk, SessionError>> + Unpin,
{
    let mut state = UploadState::AwaitInfo;
    let mut info = None;
    let mut payload = Accumulator::new(max_size);

    while let Some(frame) = frames.next().await {
        match (state, frame?) {
            (UploadState::AwaitInfo, Chunk::Info(header)) => {
                tracing::info!(
                    file_id = %header.file_id,
                    file_type = %header.file_type,
                    "upload started"
                );
                info = Some(header);
                state = UploadState::Receiving;
            }
            (UploadState::AwaitInfo, Chunk::Content(_)) => {
                return Err(SessionError::Protocol(
                    "content frame before file info".into(),
                ));
            }
            (UploadState::Receiving, Chunk::Info(_)) => {
                return Err(SessionError::Protocol("duplicate file info frame".into()));
            }
            (UploadState::Receiving, Chunk::Content(data)) => {
                payload.push(&data)?;
            }
        }
    }

    let info = info.ok_or_else(|| {
        SessionError::Protocol("stream ended before file info".into())
    })?;

    let size = payload.len();
    let stored_id = store.save(&info.file_id, &info.file_type, &payload.into_bytes())?;
    tracing::info!(file_id = %stored_id, size, "upload stored");

    Ok(UploadStatus::ok("upload received"))
}

/// Streams a payload out as fixed-size shards.
///
/// Every shard is `shard_size` bytes except possibly the last; an empty
/// payload produces no shards at all. Dropping `out` on the receiving side
/// aborts the session. Returns the number of shards sent.
pub async fn send_download(
    data: Vec<u8>,
    shard_size: usize,
    out: mpsc::Sender<Shard>,
) -> Result<usize, SessionError> {
    let mut sent = 0;
    for piece in data.chunks(shard_size) {
        out.send(Shard {
            data: piece.to_vec(),
        })
        .await
        .map_err(|_| SessionError::Transport("download receiver dropped".into()))?;
        sent += 1;
    }
    tracing::debug!(shards = sent, bytes = data.len(), "download streamed");
    Ok(sent)
}
