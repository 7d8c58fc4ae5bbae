use std::io::Read;

use fileferry_protocol::constants::MAX_CHUNK_SIZE;

use crate::TransferError;

/// Reads a byte source in chunks of at most `chunk_size` bytes.
///
/// The chunk size is validated once at construction; a size of 0 or above
/// [`MAX_CHUNK_SIZE`] is a configuration error. Short reads are allowed —
/// every yielded chunk is non-empty and no longer than `chunk_size`, and the
/// concatenation of all chunks reproduces the source exactly.
#[derive(Debug)]
pub struct ChunkReader<R> {
    source: R,
    chunk_size: usize,
    offset: u64,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(source: R, chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(TransferError::ChunkSize {
                size: chunk_size,
                max: MAX_CHUNK_SIZE,
            });
        }
        Ok(Self {
            source,
            chunk_size,
            offset: 0,
        })
    }

    /// Reads the next chunk. Returns `None` at end of source.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransferError> {
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match self.source.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    buf.truncate(n);
                    self.offset += n as u64;
                    return Ok(Some(buf));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Total bytes read so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}
