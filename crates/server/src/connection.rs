//! Per-connection message routing.
//!
//! One task reads the WebSocket and routes envelopes; a write pump owns the
//! sink so concurrent producers (upload status, download shards, health
//! replies) serialize through one channel. Upload content rides binary
//! frames into the session's frame channel; `stream_end` closes that channel
//! so the session observes a plain end-of-stream.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use fileferry_protocol::codes::ErrorCode;
use fileferry_protocol::constants::{MessageType, WS_PONG_WAIT};
use fileferry_protocol::envelope::Message;
use fileferry_protocol::messages::{Chunk, FileInfo, FileRequest, HealthCheckRequest};
use fileferry_protocol::wire::{self, BinaryHeader};

use crate::ServerError;
use crate::health::HealthRegistry;
use crate::session::{self, SessionError};
use crate::store::{FileStore, StoreError};

/// Per-connection copies of the server limits.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnLimits {
    pub max_upload_size: usize,
    pub shard_size: usize,
}

const WRITE_CHANNEL_CAPACITY: usize = 64;
const UPLOAD_CHANNEL_CAPACITY: usize = 64;
const SHARD_CHANNEL_CAPACITY: usize = 16;

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// The upload stream currently open on this connection, if any.
struct ActiveUpload {
    id: String,
    frames: mpsc::Sender<Result<Chunk, SessionError>>,
}

/// Serves one WebSocket connection until it closes, times out, or the
/// server shuts down.
pub(crate) async fn serve(
    ws_stream: WebSocketStream<TcpStream>,
    peer_addr: SocketAddr,
    store: Arc<dyn FileStore>,
    health: Arc<HealthRegistry>,
    limits: ConnLimits,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let (ws_sink, ws_source) = ws_stream.split();
    let (write_tx, write_rx) = mpsc::channel(WRITE_CHANNEL_CAPACITY);

    let write_task = tokio::spawn(write_pump(ws_sink, write_rx));
    let result = read_loop(ws_source, peer_addr, store, health, limits, cancel, &write_tx).await;

    // Outstanding session tasks hold clones of write_tx; the pump drains
    // their terminal envelopes before closing.
    drop(write_tx);
    let _ = write_task.await;

    result
}

/// Forwards outbound messages to the sink until all senders drop.
async fn write_pump(mut sink: WsSink, mut rx: mpsc::Receiver<WsMessage>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = sink.send(msg).await {
            tracing::debug!("write pump stopping: {e}");
            return;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(
    mut source: WsSource,
    peer_addr: SocketAddr,
    store: Arc<dyn FileStore>,
    health: Arc<HealthRegistry>,
    limits: ConnLimits,
    cancel: CancellationToken,
    write_tx: &mpsc::Sender<WsMessage>,
) -> Result<(), ServerError> {
    let mut upload: Option<ActiveUpload> = None;
    let mut deadline = Instant::now() + WS_PONG_WAIT;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(%peer_addr, "connection task cancelled");
                abort_upload(&mut upload, "server shutting down").await;
                return Ok(());
            }

            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(%peer_addr, "connection timed out (no traffic)");
                abort_upload(&mut upload, "connection timed out").await;
                return Ok(());
            }

            msg = source.next() => {
                deadline = Instant::now() + WS_PONG_WAIT;
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_text(
                            text.as_str(),
                            &mut upload,
                            &store,
                            &health,
                            limits,
                            write_tx,
                        )
                        .await;
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        handle_binary(&data, &mut upload, write_tx).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        // A close mid-upload is a transport abort, not a
                        // clean end-of-stream.
                        abort_upload(&mut upload, "connection closed mid-upload").await;
                        return Ok(());
                    }
                    Some(Ok(_)) => {} // ping/pong keepalive traffic
                    Some(Err(e)) => {
                        abort_upload(&mut upload, "read error").await;
                        return Err(e.into());
                    }
                }
            }
        }
    }
}

async fn handle_text(
    text: &str,
    upload: &mut Option<ActiveUpload>,
    store: &Arc<dyn FileStore>,
    health: &Arc<HealthRegistry>,
    limits: ConnLimits,
    write_tx: &mpsc::Sender<WsMessage>,
) {
    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!("unparseable envelope: {e}");
            send_envelope(
                write_tx,
                &Message::error("", ErrorCode::InvalidArgument, "malformed envelope"),
            )
            .await;
            return;
        }
    };

    match msg.msg_type {
        MessageType::UploadInfo => {
            start_upload(&msg, upload, store, limits.max_upload_size, write_tx).await;
        }
        MessageType::StreamEnd => match upload.take() {
            // Dropping the frame sender is the session's end-of-stream.
            Some(_) => {}
            None => tracing::warn!("stream_end without an open upload"),
        },
        MessageType::DownloadRequest => {
            start_download(&msg, store, limits.shard_size, write_tx).await;
        }
        MessageType::HealthCheck => {
            handle_health(&msg, health, write_tx).await;
        }
        other => {
            tracing::warn!(msg_type = ?other, "unexpected message type");
            send_envelope(
                write_tx,
                &msg.reply_error(ErrorCode::InvalidArgument, "unexpected message type"),
            )
            .await;
        }
    }
}

async fn start_upload(
    msg: &Message,
    upload: &mut Option<ActiveUpload>,
    store: &Arc<dyn FileStore>,
    max_upload_size: usize,
    write_tx: &mpsc::Sender<WsMessage>,
) {
    if upload.is_some() {
        send_envelope(
            write_tx,
            &msg.reply_error(ErrorCode::InvalidArgument, "upload already in progress"),
        )
        .await;
        return;
    }

    let info: FileInfo = match msg.parse_payload() {
        Ok(Some(info)) => info,
        _ => {
            send_envelope(
                write_tx,
                &msg.reply_error(ErrorCode::InvalidArgument, "missing or malformed file info"),
            )
            .await;
            return;
        }
    };

    let (frames_tx, frames_rx) = mpsc::channel(UPLOAD_CHANNEL_CAPACITY);
    // Seed the header so the session sees the same frame order as the wire.
    if frames_tx.send(Ok(Chunk::Info(info))).await.is_err() {
        return;
    }

    let id = msg.id.clone();
    let store = Arc::clone(store);
    let write_tx = write_tx.clone();
    tokio::spawn(async move {
        let frames = ReceiverStream::new(frames_rx);
        let reply = match session::receive_upload(frames, store.as_ref(), max_upload_size).await {
            Ok(status) => Message::new(&id, MessageType::UploadStatus, Some(&status)),
            Err(e) => {
                tracing::warn!(upload = %id, "upload failed: {e}");
                Ok(Message::error(&id, e.code(), e.to_string()))
            }
        };
        match reply {
            Ok(envelope) => send_envelope(&write_tx, &envelope).await,
            Err(e) => tracing::error!("encoding upload status: {e}"),
        }
    });

    *upload = Some(ActiveUpload {
        id: msg.id.clone(),
        frames: frames_tx,
    });
}

async fn handle_binary(
    data: &[u8],
    upload: &mut Option<ActiveUpload>,
    write_tx: &mpsc::Sender<WsMessage>,
) {
    let Some(active) = upload.as_ref() else {
        tracing::warn!("binary frame outside an upload stream");
        return;
    };

    match wire::parse_frame(data) {
        Ok((header, payload)) => {
            if header.id != active.id {
                tracing::warn!(
                    frame = %header.id,
                    upload = %active.id,
                    "binary frame for wrong stream"
                );
                return;
            }
            // A closed receiver means the session already terminated; its
            // terminal envelope is on the way, so excess frames are dropped.
            let _ = active.frames.send(Ok(Chunk::Content(payload))).await;
        }
        Err(e) => {
            if let Some(active) = upload.take() {
                let _ = active
                    .frames
                    .send(Err(SessionError::Protocol(format!("bad binary frame: {e}"))))
                    .await;
            }
            send_envelope(
                write_tx,
                &Message::error("", ErrorCode::InvalidArgument, format!("bad binary frame: {e}")),
            )
            .await;
        }
    }
}

async fn start_download(
    msg: &Message,
    store: &Arc<dyn FileStore>,
    shard_size: usize,
    write_tx: &mpsc::Sender<WsMessage>,
) {
    let req: FileRequest = match msg.parse_payload() {
        Ok(Some(req)) => req,
        _ => {
            send_envelope(
                write_tx,
                &msg.reply_error(ErrorCode::InvalidArgument, "missing or malformed file request"),
            )
            .await;
            return;
        }
    };

    let id = msg.id.clone();
    let store = Arc::clone(store);
    let write_tx = write_tx.clone();
    tokio::spawn(async move {
        let filename = req.filename.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load(&req.filename)).await;
        let data = match loaded {
            Ok(Ok(data)) => data,
            Ok(Err(StoreError::NotFound(name))) => {
                send_envelope(
                    &write_tx,
                    &Message::error(&id, ErrorCode::NotFound, format!("file not found: {name}")),
                )
                .await;
                return;
            }
            Ok(Err(e)) => {
                tracing::warn!(%filename, "download open failed: {e}");
                send_envelope(&write_tx, &Message::error(&id, ErrorCode::Aborted, e.to_string()))
                    .await;
                return;
            }
            Err(e) => {
                tracing::error!("download task panicked: {e}");
                send_envelope(
                    &write_tx,
                    &Message::error(&id, ErrorCode::Internal, "internal error"),
                )
                .await;
                return;
            }
        };

        tracing::info!(%filename, bytes = data.len(), "download started");

        let (shard_tx, mut shard_rx) = mpsc::channel(SHARD_CHANNEL_CAPACITY);
        let sender = tokio::spawn(session::send_download(data, shard_size, shard_tx));

        let mut offset = 0u64;
        while let Some(shard) = shard_rx.recv().await {
            let header = BinaryHeader {
                id: id.clone(),
                offset,
            };
            offset += shard.data.len() as u64;
            match wire::encode_frame(&header, &shard.data) {
                Ok(frame) => {
                    if write_tx.send(WsMessage::Binary(frame.into())).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!("encoding shard frame: {e}");
                    return;
                }
            }
        }

        match sender.await {
            Ok(Ok(_)) => {
                // Closing the send half is the only end-of-download marker.
                match Message::new::<()>(&id, MessageType::StreamEnd, None) {
                    Ok(end) => send_envelope(&write_tx, &end).await,
                    Err(e) => tracing::error!("encoding stream end: {e}"),
                }
            }
            Ok(Err(e)) => {
                send_envelope(&write_tx, &Message::error(&id, e.code(), e.to_string())).await;
            }
            Err(e) => tracing::error!("download sender panicked: {e}"),
        }
    });
}

async fn handle_health(
    msg: &Message,
    health: &Arc<HealthRegistry>,
    write_tx: &mpsc::Sender<WsMessage>,
) {
    let req: HealthCheckRequest = match msg.parse_payload() {
        Ok(Some(req)) => req,
        _ => {
            send_envelope(
                write_tx,
                &msg.reply_error(ErrorCode::InvalidArgument, "missing or malformed health check"),
            )
            .await;
            return;
        }
    };

    let reply = match health.check(&req) {
        Some(resp) => match msg.reply(MessageType::HealthStatus, Some(&resp)) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("encoding health status: {e}");
                return;
            }
        },
        None => msg.reply_error(ErrorCode::NotFound, format!("unknown service: {}", req.service)),
    };
    send_envelope(write_tx, &reply).await;
}

/// Surfaces a transport failure to the open upload session, if any.
async fn abort_upload(upload: &mut Option<ActiveUpload>, reason: &str) {
    if let Some(active) = upload.take() {
        let _ = active
            .frames
            .send(Err(SessionError::Transport(reason.into())))
            .await;
    }
}

async fn send_envelope(tx: &mpsc::Sender<WsMessage>, msg: &Message) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let _ = tx.send(WsMessage::Text(json.into())).await;
        }
        Err(e) => tracing::error!("encoding envelope: {e}"),
    }
}
