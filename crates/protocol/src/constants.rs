//! Protocol constants shared by both ends of the connection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hard cap on a single upload payload: 4 MiB.
///
/// The server enforces this against the running total of received content
/// bytes; the client may pre-check it as a fast fail.
pub const MAX_UPLOAD_SIZE: usize = 1 << 22;

/// Ceiling for a single upload chunk. A chunk size of 0 or above this is a
/// configuration error.
pub const MAX_CHUNK_SIZE: usize = 1 << 22;

/// Default upload chunk size: 4 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 12;

/// Fixed download shard size: 1 KiB. Independent of the upload chunk size;
/// every shard is this long except possibly the last.
pub const SHARD_SIZE: usize = 1024;

/// Maximum WebSocket message size. Leaves headroom above [`MAX_CHUNK_SIZE`]
/// for the binary frame header.
pub const WS_MAX_MESSAGE_SIZE: usize = MAX_CHUNK_SIZE + (1 << 16);

/// Keepalive ping period.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(30);

/// How long the read side waits without any traffic before declaring the
/// connection dead. Must exceed [`WS_PING_PERIOD`].
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// Timeout for a unary request-response exchange (health check, terminal
/// upload status).
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default health-probe polling interval.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Message types carried in the envelope `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Upload header: opens an upload stream (payload: `FileInfo`).
    UploadInfo,
    /// Terminal upload result (payload: `UploadStatus`).
    UploadStatus,
    /// Download request (payload: `FileRequest`).
    DownloadRequest,
    /// Transport-level close of a logical stream's send half. Carries no
    /// payload; sessions observe it only as end-of-stream.
    StreamEnd,
    /// Health check request (payload: `HealthCheckRequest`).
    HealthCheck,
    /// Health check response (payload: `HealthCheckResponse`).
    HealthStatus,
    /// Error reply; details live in the envelope `error` field.
    Error,
}
