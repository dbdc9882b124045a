//! Sliding window (LZ77 history buffer) for LZX decompression.
//!
//! The window is a power-of-two circular buffer holding the most recent
//! output. LZX windows range from 32 KiB to 2 MiB; the size comes from the
//! LZXC header of the archive being read. The window persists across blocks
//! within one reset interval and is cleared at every interval boundary.

use crate::error::{ChmError, Result};

/// Smallest window size LZX defines (32 KiB).
pub const MIN_WINDOW: usize = 0x8000;

/// Largest window size LZX defines (2 MiB).
pub const MAX_WINDOW: usize = 0x20_0000;

/// A circular history buffer with LZ77 copy-back semantics.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    /// The underlying buffer.
    buffer: Vec<u8>,
    /// Current write position.
    position: usize,
    /// Bytes written since the last reset (capped at capacity).
    size: usize,
    /// Mask for cheap modulo (capacity - 1).
    mask: usize,
}

impl SlidingWindow {
    /// Create a window with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a power of two. Callers validate
    /// the LZXC window size before constructing a window.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        assert!(
            capacity.is_power_of_two(),
            "capacity must be a power of 2, got {}",
            capacity
        );

        Self {
            buffer: vec![0; capacity],
            position: 0,
            size: 0,
            mask: capacity - 1,
        }
    }

    /// Capacity of the window.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes of history currently available.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether no history is available.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Zero the buffer and both counters. Called at reset-interval boundaries.
    pub fn reset(&mut self) {
        self.buffer.fill(0);
        self.position = 0;
        self.size = 0;
    }

    /// Write one literal byte into the window.
    pub fn write_byte(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position = (self.position + 1) & self.mask;
        if self.size < self.buffer.len() {
            self.size += 1;
        }
    }

    /// Copy `length` bytes from `distance` back, appending each to `output`
    /// as well as to the window itself.
    ///
    /// The copy proceeds byte-by-byte so that `length > distance` produces
    /// the self-extending repetition LZ77 requires.
    pub fn copy_match(&mut self, distance: usize, length: usize, output: &mut Vec<u8>) -> Result<()> {
        if distance == 0 || distance > self.size {
            return Err(ChmError::invalid_match(
                distance as u32,
                length as u32,
                self.size as u64,
            ));
        }

        output.reserve(length);
        let mut src = (self.position.wrapping_sub(distance)) & self.mask;

        for _ in 0..length {
            let byte = self.buffer[src];
            self.buffer[self.position] = byte;
            self.position = (self.position + 1) & self.mask;
            if self.size < self.buffer.len() {
                self.size += 1;
            }
            output.push(byte);
            src = (src + 1) & self.mask;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(bytes: &[u8]) -> SlidingWindow {
        let mut window = SlidingWindow::new(32);
        for &b in bytes {
            window.write_byte(b);
        }
        window
    }

    #[test]
    fn test_copy_match_basic() {
        let mut window = filled(b"ABCD");
        let mut out = Vec::new();
        window.copy_match(4, 4, &mut out).unwrap();
        assert_eq!(out, b"ABCD");
    }

    #[test]
    fn test_copy_match_self_extending() {
        // length > distance repeats the tail: "AB" + copy(2, 6) -> "ABABAB"
        let mut window = filled(b"AB");
        let mut out = Vec::new();
        window.copy_match(2, 6, &mut out).unwrap();
        assert_eq!(out, b"ABABAB");
    }

    #[test]
    fn test_copy_match_run_of_one() {
        let mut window = filled(b"X");
        let mut out = Vec::new();
        window.copy_match(1, 5, &mut out).unwrap();
        assert_eq!(out, b"XXXXX");
    }

    #[test]
    fn test_copy_updates_history() {
        // Bytes produced by a match are themselves matchable.
        let mut window = filled(b"AB");
        let mut out = Vec::new();
        window.copy_match(2, 2, &mut out).unwrap();
        window.copy_match(4, 4, &mut out).unwrap();
        assert_eq!(out, b"ABABAB");
    }

    #[test]
    fn test_invalid_distance() {
        let mut window = filled(b"AB");
        let mut out = Vec::new();
        assert!(matches!(
            window.copy_match(3, 1, &mut out),
            Err(ChmError::InvalidMatch {
                distance: 3,
                length: 1,
                window_pos: 2,
            })
        ));
        assert!(window.copy_match(0, 1, &mut out).is_err());
    }

    #[test]
    fn test_reset_clears_history() {
        let mut window = filled(b"ABCDEFGH");
        window.reset();
        assert_eq!(window.len(), 0);
        let mut out = Vec::new();
        assert!(window.copy_match(1, 1, &mut out).is_err());
    }

    #[test]
    fn test_wraparound() {
        let mut window = SlidingWindow::new(4);
        for &b in b"ABCDEF" {
            window.write_byte(b);
        }
        assert_eq!(window.len(), 4);
        let mut out = Vec::new();
        window.copy_match(4, 2, &mut out).unwrap();
        assert_eq!(out, b"CD");
    }

    #[test]
    #[should_panic(expected = "power of 2")]
    fn test_non_power_of_two_panics() {
        let _ = SlidingWindow::new(100);
    }
}
