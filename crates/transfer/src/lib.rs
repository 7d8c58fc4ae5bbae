//! Transfer primitives shared by the fileferry client and server: fixed-size
//! chunk reading, capped byte accumulation, transfer stats, and probe
//! interval parsing.

mod accumulate;
mod chunked;
mod interval;
mod stats;

pub use accumulate::Accumulator;
pub use chunked::ChunkReader;
pub use interval::parse_interval;
pub use stats::{ProbeStats, TransferStats};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chunk size {size}: must be between 1 and {max} bytes")]
    ChunkSize { size: usize, max: usize },

    #[error("payload too large: {received} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { received: usize, limit: usize },

    #[error("invalid interval {0:?}")]
    InvalidInterval(String),
}
