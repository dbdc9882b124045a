//! Host I/O seams for the codec.
//!
//! The codec itself is synchronous and operates over in-memory byte slices;
//! these traits are the only boundary where a host supplies data. A reader
//! hands the facade a [`ByteSource`] (random-access reads), a packer hands it
//! a [`ByteSink`] (sequential writes), and long extractions may be interrupted
//! through a [`CancelToken`] polled between LZX blocks.

use crate::error::{ChmError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Random-access byte supplier backing an open archive.
pub trait ByteSource {
    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    /// Whether the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` from `offset`. Fails if the range is out of bounds.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Read `len` bytes at `offset` into a fresh vector.
    fn read_vec_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

impl ByteSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| ChmError::end_of_stream(buf.len() * 8))?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= <[u8]>::len(self))
            .ok_or_else(|| ChmError::end_of_stream(buf.len() * 8))?;
        buf.copy_from_slice(&self[start..end]);
        Ok(())
    }
}

impl ByteSource for &[u8] {
    fn len(&self) -> u64 {
        <[u8] as ByteSource>::len(self)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        <[u8] as ByteSource>::read_at(self, offset, buf)
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> u64 {
        <[u8] as ByteSource>::len(self)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        <[u8] as ByteSource>::read_at(self, offset, buf)
    }
}

/// Sequential byte consumer for the pack path.
pub trait ByteSink {
    /// Write all of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<W: std::io::Write> ByteSink for W {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, bytes)?;
        Ok(())
    }
}

/// A cloneable cancellation flag polled between LZX blocks.
///
/// Cancellation is cooperative: the decoder checks the flag at block
/// boundaries only, so a cancelled extraction never exposes partial
/// mid-block state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Return `Err(Cancelled)` if cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ChmError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source() {
        let data: &[u8] = b"hello world";
        let mut buf = [0u8; 5];
        data.read_at(6, &mut buf).unwrap();
        assert_eq!(&buf, b"world");
        assert_eq!(ByteSource::len(&data), 11);
        assert!(data.read_at(7, &mut buf).is_err());
    }

    #[test]
    fn test_vec_source_and_read_vec_at() {
        let data = b"0123456789".to_vec();
        assert_eq!(data.read_vec_at(2, 3).unwrap(), b"234");
        assert!(data.read_vec_at(9, 2).is_err());
    }

    #[test]
    fn test_vec_sink() {
        let mut sink: Vec<u8> = Vec::new();
        ByteSink::write_all(&mut sink, b"ab").unwrap();
        ByteSink::write_all(&mut sink, b"cd").unwrap();
        assert_eq!(sink, b"abcd");
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ChmError::Cancelled)));
    }
}
