//! # OxiChm LZX
//!
//! Pure Rust implementation of Microsoft's LZX compression as used by CHM
//! content sections.
//!
//! LZX is LZ77 with canonical Huffman coding on top: literals and
//! match-header symbols share a main tree, long match lengths spill into a
//! length tree, and match distances are classified into position slots with
//! raw footer bits (or, in aligned-offset blocks, an extra aligned tree for
//! the low three bits). The decoder supports all three block types; the
//! encoder emits verbatim blocks only, which every LZX decoder accepts.
//!
//! Streams are processed in *reset intervals*. State never crosses an
//! interval boundary, so a decoder can enter the stream at any boundary
//! listed in the archive's reset table — that is what makes random access
//! into large CHM sections cheap.
//!
//! ## Example
//!
//! ```rust
//! use oxichm_lzx::{LzxDecoder, LzxEncoder};
//!
//! let input = b"the same words repeated twice; the same words repeated twice";
//! let encoder = LzxEncoder::new(0x8000, 0x8000).unwrap();
//! let section = encoder.encode_section(input).unwrap();
//!
//! let mut decoder = LzxDecoder::new(0x8000, 0x8000).unwrap();
//! let (output, _) = decoder
//!     .decode_interval(&section.data, input.len(), None)
//!     .unwrap();
//! assert_eq!(output, input);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod decoder;
pub mod encoder;
pub mod huffman;
pub mod lz77;
pub mod tables;

// Re-exports
pub use decoder::LzxDecoder;
pub use encoder::{EncodedSection, LzxEncoder};
pub use huffman::{HuffmanBuilder, HuffmanTable};
pub use lz77::{Lz77Token, MatchFinder};
