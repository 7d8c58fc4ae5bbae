//! Numeric error codes carried in error envelopes.
//!
//! The values match the gRPC status space so that classification rules
//! (notably the health probe's transient set) stay comparable with other
//! tooling in the fleet.

use serde::{Deserialize, Serialize};

/// Error classification for failed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum ErrorCode {
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    Aborted,
    Internal,
    Unavailable,
    DataLoss,
}

impl ErrorCode {
    /// Returns `true` for codes the health-probe loop treats as non-fatal:
    /// the next poll tick simply issues a fresh call.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorCode::Aborted
                | ErrorCode::DataLoss
                | ErrorCode::DeadlineExceeded
                | ErrorCode::Internal
                | ErrorCode::Unavailable
        )
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> i32 {
        match code {
            ErrorCode::Unknown => 2,
            ErrorCode::InvalidArgument => 3,
            ErrorCode::DeadlineExceeded => 4,
            ErrorCode::NotFound => 5,
            ErrorCode::Aborted => 10,
            ErrorCode::Internal => 13,
            ErrorCode::Unavailable => 14,
            ErrorCode::DataLoss => 15,
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            3 => ErrorCode::InvalidArgument,
            4 => ErrorCode::DeadlineExceeded,
            5 => ErrorCode::NotFound,
            10 => ErrorCode::Aborted,
            13 => ErrorCode::Internal,
            14 => ErrorCode::Unavailable,
            15 => ErrorCode::DataLoss,
            _ => ErrorCode::Unknown,
        }
    }
}
