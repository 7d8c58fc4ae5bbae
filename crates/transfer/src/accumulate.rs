use crate::TransferError;

/// A growing byte buffer with a hard size cap.
///
/// The server-side upload session owns one per stream; the first append that
/// pushes the running total past the cap fails, after which the caller is
/// expected to discard the whole buffer — partial data never reaches storage.
#[derive(Debug)]
pub struct Accumulator {
    buf: Vec<u8>,
    limit: usize,
}

impl Accumulator {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    /// Appends `data`, failing if the running total would exceed the cap.
    /// On failure the buffer is left unchanged.
    pub fn push(&mut self, data: &[u8]) -> Result<(), TransferError> {
        let received = self.buf.len() + data.len();
        if received > self.limit {
            return Err(TransferError::PayloadTooLarge {
                received,
                limit: self.limit,
            });
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the accumulator, yielding the full payload.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_in_order() {
        let mut acc = Accumulator::new(64);
        acc.push(b"Hello").unwrap();
        acc.push(b", ").unwrap();
        acc.push(b"world").unwrap();
        assert_eq!(acc.len(), 12);
        assert_eq!(acc.into_bytes(), b"Hello, world");
    }

    #[test]
    fn empty_append_is_fine() {
        let mut acc = Accumulator::new(4);
        acc.push(&[]).unwrap();
        assert!(acc.is_empty());
    }

    #[test]
    fn exact_limit_is_accepted() {
        let mut acc = Accumulator::new(10);
        acc.push(&[0u8; 10]).unwrap();
        assert_eq!(acc.len(), 10);
    }

    #[test]
    fn one_byte_over_limit_is_rejected() {
        let mut acc = Accumulator::new(10);
        acc.push(&[0u8; 10]).unwrap();
        let err = acc.push(&[0u8]).unwrap_err();
        assert!(matches!(
            err,
            TransferError::PayloadTooLarge {
                received: 11,
                limit: 10
            }
        ));
        // Rejected append leaves the buffer unchanged.
        assert_eq!(acc.len(), 10);
    }

    #[test]
    fn single_oversized_append_rejected() {
        let mut acc = Accumulator::new(4);
        assert!(acc.push(&[0u8; 5]).is_err());
        assert!(acc.is_empty());
    }
}
