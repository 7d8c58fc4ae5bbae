//! Binary content frames: 4-byte big-endian header length + JSON header +
//! raw payload.
//!
//! Upload chunks and download shards both use this framing; the frame kind
//! is implied by the direction of the stream it arrives on, so a single
//! header shape covers both.

use serde::{Deserialize, Serialize};

/// Header prefixed to every binary content frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryHeader {
    /// Id of the stream this frame belongs to (the envelope id that opened
    /// the upload or download).
    pub id: String,
    /// Byte offset of this frame's payload within the transfer. Informational
    /// only; ordering is guaranteed by the transport.
    #[serde(default)]
    pub offset: u64,
}

/// Errors from binary frame parsing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short (need at least 4 bytes)")]
    TooShort,

    #[error("frame header truncated: expected {expected} bytes, got {got}")]
    HeaderTruncated { expected: usize, got: usize },

    #[error("invalid frame header JSON: {0}")]
    InvalidHeader(String),
}

/// Encodes a binary content frame.
pub fn encode_frame(header: &BinaryHeader, payload: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let header_json = serde_json::to_vec(header)?;
    let header_len = header_json.len() as u32;

    let mut buf = Vec::with_capacity(4 + header_json.len() + payload.len());
    buf.extend_from_slice(&header_len.to_be_bytes());
    buf.extend_from_slice(&header_json);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Parses a binary content frame into its header and payload.
pub fn parse_frame(data: &[u8]) -> Result<(BinaryHeader, Vec<u8>), FrameError> {
    if data.len() < 4 {
        return Err(FrameError::TooShort);
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&data[..4]);
    let header_len = u32::from_be_bytes(len_bytes) as usize;

    if data.len() < 4 + header_len {
        return Err(FrameError::HeaderTruncated {
            expected: header_len,
            got: data.len() - 4,
        });
    }

    let header: BinaryHeader = serde_json::from_slice(&data[4..4 + header_len])
        .map_err(|e| FrameError::InvalidHeader(e.to_string()))?;
    let payload = data[4 + header_len..].to_vec();

    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_parse_roundtrip() {
        let header = BinaryHeader {
            id: "up-1".into(),
            offset: 4096,
        };
        let payload = b"chunk payload bytes";

        let frame = encode_frame(&header, payload).unwrap();
        let (parsed, data) = parse_frame(&frame).unwrap();

        assert_eq!(parsed, header);
        assert_eq!(data, payload);
    }

    #[test]
    fn empty_payload() {
        let header = BinaryHeader {
            id: "dl-9".into(),
            offset: 0,
        };
        let frame = encode_frame(&header, &[]).unwrap();
        let (parsed, data) = parse_frame(&frame).unwrap();
        assert_eq!(parsed.id, "dl-9");
        assert!(data.is_empty());
    }

    #[test]
    fn too_short_rejected() {
        assert!(matches!(parse_frame(&[0, 0, 0]), Err(FrameError::TooShort)));
    }

    #[test]
    fn truncated_header_rejected() {
        // Header claims 80 bytes but the frame carries 3.
        let data = [0, 0, 0, 80, 1, 2, 3];
        assert!(matches!(
            parse_frame(&data),
            Err(FrameError::HeaderTruncated {
                expected: 80,
                got: 3
            })
        ));
    }

    #[test]
    fn garbage_header_rejected() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&8u32.to_be_bytes());
        frame.extend_from_slice(b"not json");
        frame.extend_from_slice(b"payload");
        assert!(matches!(
            parse_frame(&frame),
            Err(FrameError::InvalidHeader(_))
        ));
    }

    #[test]
    fn offset_defaults_to_zero() {
        let mut frame = Vec::new();
        let header = br#"{"id":"x"}"#;
        frame.extend_from_slice(&(header.len() as u32).to_be_bytes());
        frame.extend_from_slice(header);
        let (parsed, _) = parse_frame(&frame).unwrap();
        assert_eq!(parsed.offset, 0);
    }
}
