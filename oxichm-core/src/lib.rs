//! # OxiChm Core
//!
//! Core components for the OxiChm CHM (Compiled HTML Help) library.
//!
//! This crate provides the fundamental building blocks shared by the LZX
//! codec and the archive layer:
//!
//! - [`bitstream`]: MSB-first bit extraction and little-endian primitives
//!   over in-memory buffers
//! - [`window`]: LZ77 sliding window for LZX decompression
//! - [`encint`]: big-endian base-128 varints used by directory chunks
//! - [`traits`]: `ByteSource`/`ByteSink` host I/O seams and cancellation
//! - [`mmap`]: memory-mapped `ByteSource`
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! OxiChm is designed as a layered stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Archive (oxichm-archive)                            │
//! │     ITSF/ITSP/LZXC headers, PMGL/PMGI directory,        │
//! │     reset table, reader/writer facade                   │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec (oxichm-lzx)                                  │
//! │     LZX decoder/encoder, canonical Huffman              │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                              │
//! │     BitReader/BitWriter, SlidingWindow, ENCINT          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxichm_core::bitstream::BitReader;
//!
//! let data = vec![0xAB, 0xCD];
//! let mut reader = BitReader::new(&data);
//! let bits = reader.read_bits(12).unwrap();
//! assert_eq!(bits, 0xABC);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod encint;
pub mod error;
pub mod mmap;
pub mod traits;
pub mod window;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use encint::{encint_len, read_encint, write_encint};
pub use error::{ChmError, Result};
pub use mmap::MmapSource;
pub use traits::{ByteSink, ByteSource, CancelToken};
pub use window::SlidingWindow;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitstream::{BitReader, BitWriter};
    pub use crate::error::{ChmError, Result};
    pub use crate::traits::{ByteSink, ByteSource, CancelToken};
    pub use crate::window::SlidingWindow;
}
