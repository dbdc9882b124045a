//! Error types for OxiChm operations.
//!
//! This module provides a comprehensive error type that covers all possible
//! error conditions in CHM archive operations: I/O errors, header and
//! directory validation errors, and LZX decoding errors.

use std::io;
use thiserror::Error;

/// The main error type for OxiChm operations.
#[derive(Debug, Error)]
pub enum ChmError {
    /// I/O error from the underlying source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A fixed header did not start with its expected ASCII signature.
    #[error("Bad signature: expected {expected:?}, found {found:02x?}")]
    BadSignature {
        /// Expected ASCII signature.
        expected: &'static str,
        /// Actual bytes found.
        found: [u8; 4],
    },

    /// A fixed header carried a version this library does not speak.
    #[error("Unsupported {header} version: expected {expected}, found {found}")]
    UnsupportedVersion {
        /// Which header was being parsed.
        header: &'static str,
        /// Version this library supports.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// The file ended before a fixed-layout record was complete.
    #[error("Truncated record at offset {offset}: need {needed} more bytes")]
    HeaderTruncated {
        /// File offset of the record.
        offset: u64,
        /// Bytes that were missing.
        needed: usize,
    },

    /// A numeric header field was outside its allowed range.
    #[error("Invalid header field {field}: {value:#x}")]
    InvalidHeaderField {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: u64,
    },

    /// The directory chunk area could not be parsed.
    #[error("Corrupt directory at offset {offset}: {message}")]
    DirectoryCorrupt {
        /// Byte offset (within the directory region) of the problem.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Entry names within a leaf chunk were not sorted (strict mode only).
    #[error("Directory entries out of order in chunk {chunk}")]
    DirectoryUnsorted {
        /// Index of the offending chunk.
        chunk: u32,
    },

    /// The LZX reset table was missing, truncated, or inconsistent.
    #[error("Corrupt reset table: {message}")]
    ResetTableCorrupt {
        /// Description of the problem.
        message: String,
    },

    /// No entry with the requested name exists in the archive.
    #[error("Entry not found: {name}")]
    EntryNotFound {
        /// Name of the missing entry.
        name: String,
    },

    /// A byte-aligned primitive was read while mid-byte.
    #[error("Byte-aligned read at bit offset {bit_pos}")]
    Misaligned {
        /// Bits already consumed from the current byte (1-7).
        bit_pos: u8,
    },

    /// The bit stream ended before the requested bits were available.
    #[error("End of stream: {needed} more bits requested")]
    EndOfStream {
        /// Number of bits that were requested but not available.
        needed: usize,
    },

    /// A code-length vector did not describe a complete Huffman tree.
    #[error("Incomplete Huffman code lengths")]
    InvalidHuffman,

    /// No symbol matched the bit stream within the maximum code length.
    #[error("Invalid Huffman code at bit position {bit_position}")]
    InvalidHuffmanCode {
        /// Bit position where decoding failed.
        bit_position: u64,
    },

    /// An LZX block ended before its declared output was produced.
    #[error("Truncated LZX block")]
    TruncatedBlock,

    /// An LZX block header carried an undefined block type.
    #[error("Unknown LZX block type {block_type}")]
    UnknownBlockType {
        /// The 3-bit type value found.
        block_type: u8,
    },

    /// A match referenced data beyond the available window history.
    #[error("Invalid match: distance {distance}, length {length}, window holds {window_pos} bytes")]
    InvalidMatch {
        /// Back-reference distance.
        distance: u32,
        /// Match length.
        length: u32,
        /// Bytes of history available when the match was decoded.
        window_pos: u64,
    },

    /// A block declared more output than the current reset interval has left.
    #[error("Block output overflow: declared {declared} bytes with {remaining} left in interval")]
    OutputOverflow {
        /// Output size declared by the block header.
        declared: u64,
        /// Bytes remaining in the reset interval.
        remaining: u64,
    },

    /// The window size is not one of the sizes LZX defines.
    #[error("Unsupported LZX window size {size:#x}")]
    WindowTooSmall {
        /// The rejected window size.
        size: u32,
    },

    /// The LZX encoder could not produce a valid stream.
    #[error("Encoder failure: {message}")]
    EncoderFailure {
        /// Description of the failure.
        message: String,
    },

    /// The operation was cancelled between blocks via a [`CancelToken`].
    ///
    /// [`CancelToken`]: crate::traits::CancelToken
    #[error("Operation cancelled")]
    Cancelled,

    /// Extraction of a named entry failed; wraps the decode error with the
    /// section offset that was being read.
    #[error("Extracting {name} at section offset {offset} failed: {source}")]
    Extract {
        /// Name of the entry being extracted.
        name: String,
        /// Uncompressed-section offset of the failure.
        offset: u64,
        /// The underlying decode error.
        #[source]
        source: Box<ChmError>,
    },
}

/// Result type alias for OxiChm operations.
pub type Result<T> = std::result::Result<T, ChmError>;

impl ChmError {
    /// Create a bad signature error.
    pub fn bad_signature(expected: &'static str, found: [u8; 4]) -> Self {
        Self::BadSignature { expected, found }
    }

    /// Create an unsupported version error.
    pub fn unsupported_version(header: &'static str, expected: u32, found: u32) -> Self {
        Self::UnsupportedVersion {
            header,
            expected,
            found,
        }
    }

    /// Create a truncated record error.
    pub fn truncated(offset: u64, needed: usize) -> Self {
        Self::HeaderTruncated { offset, needed }
    }

    /// Create an invalid header field error.
    pub fn invalid_field(field: &'static str, value: u64) -> Self {
        Self::InvalidHeaderField { field, value }
    }

    /// Create a corrupt directory error.
    pub fn directory_corrupt(offset: u64, message: impl Into<String>) -> Self {
        Self::DirectoryCorrupt {
            offset,
            message: message.into(),
        }
    }

    /// Create a corrupt reset table error.
    pub fn reset_table(message: impl Into<String>) -> Self {
        Self::ResetTableCorrupt {
            message: message.into(),
        }
    }

    /// Create an entry not found error.
    pub fn entry_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound { name: name.into() }
    }

    /// Create an end-of-stream error.
    pub fn end_of_stream(needed: usize) -> Self {
        Self::EndOfStream { needed }
    }

    /// Create an invalid Huffman code error.
    pub fn invalid_code(bit_position: u64) -> Self {
        Self::InvalidHuffmanCode { bit_position }
    }

    /// Create an invalid match error.
    pub fn invalid_match(distance: u32, length: u32, window_pos: u64) -> Self {
        Self::InvalidMatch {
            distance,
            length,
            window_pos,
        }
    }

    /// Create an encoder failure error.
    pub fn encoder(message: impl Into<String>) -> Self {
        Self::EncoderFailure {
            message: message.into(),
        }
    }

    /// Wrap a decode error with the entry name and section offset it hit.
    pub fn extract_context(self, name: impl Into<String>, offset: u64) -> Self {
        Self::Extract {
            name: name.into(),
            offset,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChmError::bad_signature("ITSF", *b"XTSF");
        assert!(err.to_string().contains("ITSF"));

        let err = ChmError::unsupported_version("ITSP", 1, 9);
        assert!(err.to_string().contains("expected 1, found 9"));

        let err = ChmError::entry_not_found("/missing.html");
        assert!(err.to_string().contains("/missing.html"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: ChmError = io_err.into();
        assert!(matches!(err, ChmError::Io(_)));
    }

    #[test]
    fn test_extract_context_chains_source() {
        let err = ChmError::TruncatedBlock.extract_context("/a.html", 0x8000);
        let text = err.to_string();
        assert!(text.contains("/a.html"));
        assert!(text.contains("32768"));
        assert!(matches!(err, ChmError::Extract { .. }));
    }
}
