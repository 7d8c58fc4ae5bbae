//! Payload types for the three service operations.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Upload header, sent exactly once as the first frame of an upload stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_id: String,
    /// Visibility class of the stored file ("public" or "private").
    pub file_type: String,
}

/// One frame of an upload stream.
///
/// Exactly one of the variants per frame; the session layer enforces that
/// `Info` comes first and never again. Externally tagged serde form matches
/// the wire framing: `{"info":{...}}` or `{"content":"<base64>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chunk {
    Info(FileInfo),
    Content(#[serde(with = "base64_bytes")] Vec<u8>),
}

/// Result codes for the terminal upload status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum StatusCode {
    Unknown,
    Ok,
    Failed,
}

impl From<StatusCode> for i32 {
    fn from(code: StatusCode) -> i32 {
        match code {
            StatusCode::Unknown => 0,
            StatusCode::Ok => 1,
            StatusCode::Failed => 2,
        }
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        match code {
            1 => StatusCode::Ok,
            2 => StatusCode::Failed,
            _ => StatusCode::Unknown,
        }
    }
}

/// The single terminal value returned to an uploading client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub message: String,
    pub code: StatusCode,
}

impl UploadStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: StatusCode::Ok,
        }
    }
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Opens a download stream for a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRequest {
    pub filename: String,
}

/// One frame of a download stream. The stream's end is the only termination
/// marker; there is no explicit last-shard flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Serving classification of a named service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum ServingStatus {
    Unknown,
    Serving,
    NotServing,
}

impl From<ServingStatus> for i32 {
    fn from(status: ServingStatus) -> i32 {
        match status {
            ServingStatus::Unknown => 0,
            ServingStatus::Serving => 1,
            ServingStatus::NotServing => 2,
        }
    }
}

impl From<i32> for ServingStatus {
    fn from(status: i32) -> Self {
        match status {
            1 => ServingStatus::Serving,
            2 => ServingStatus::NotServing,
            _ => ServingStatus::Unknown,
        }
    }
}

/// Health check request. An empty `service` asks for overall process health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service: String,
    /// Client wall-clock time at send, for latency inspection in logs.
    pub ping_at: String,
    /// Caller identity, e.g. an organization id.
    pub label: String,
    /// Monotonically increasing poll counter, stringified.
    pub counter: String,
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    pub status: ServingStatus,
    pub received_at: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Base64 serde module for byte fields in JSON frames.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_info_wire_shape() {
        let chunk = Chunk::Info(FileInfo {
            file_id: "report.pdf".into(),
            file_type: "public".into(),
        });
        let json = serde_json::to_string(&chunk).unwrap();
        assert_eq!(
            json,
            r#"{"info":{"fileId":"report.pdf","fileType":"public"}}"#
        );
        let parsed: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, chunk);
    }

    #[test]
    fn chunk_content_is_base64() {
        let chunk = Chunk::Content(b"Hello".to_vec());
        let json = serde_json::to_string(&chunk).unwrap();
        assert_eq!(json, r#"{"content":"SGVsbG8="}"#);
        let parsed: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, chunk);
    }

    #[test]
    fn chunk_empty_content_roundtrip() {
        let chunk = Chunk::Content(Vec::new());
        let json = serde_json::to_string(&chunk).unwrap();
        let parsed: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, chunk);
    }

    #[test]
    fn status_code_numbering() {
        assert_eq!(i32::from(StatusCode::Unknown), 0);
        assert_eq!(i32::from(StatusCode::Ok), 1);
        assert_eq!(i32::from(StatusCode::Failed), 2);
        assert_eq!(StatusCode::from(7), StatusCode::Unknown);
    }

    #[test]
    fn upload_status_serializes_code_as_number() {
        let status = UploadStatus::ok("upload received");
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"code\":1"));
        let parsed: UploadStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.code, StatusCode::Ok);
    }

    #[test]
    fn serving_status_numbering() {
        assert_eq!(i32::from(ServingStatus::Serving), 1);
        assert_eq!(i32::from(ServingStatus::NotServing), 2);
        assert_eq!(ServingStatus::from(0), ServingStatus::Unknown);
        assert_eq!(ServingStatus::from(42), ServingStatus::Unknown);
    }

    #[test]
    fn health_request_omits_empty_service() {
        let req = HealthCheckRequest {
            service: String::new(),
            ping_at: "t0".into(),
            label: "org100".into(),
            counter: "3".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("service"));
        assert!(json.contains("\"pingAt\":\"t0\""));

        let parsed: HealthCheckRequest = serde_json::from_str(&json).unwrap();
        assert!(parsed.service.is_empty());
    }

    #[test]
    fn health_response_roundtrip() {
        let resp = HealthCheckResponse {
            status: ServingStatus::NotServing,
            received_at: "2024-06-01T12:00:00Z".into(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":2"));
        assert!(json.contains("receivedAt"));
        let parsed: HealthCheckResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, resp);
    }
}
