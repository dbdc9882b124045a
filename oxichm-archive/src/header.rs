//! The three fixed-layout records at the front of a CHM file.
//!
//! - `ITSF` (96 bytes): opens the file and locates the directory.
//! - `ITSP` (84 bytes): describes the directory chunk area.
//! - `LZXC` (40 bytes): compression parameters of the content section.
//!
//! Every numeric field is little-endian; the four-byte signatures are raw
//! ASCII. Parsers consume exactly the declared record length from a
//! byte-aligned reader; serializers pad with zeros up to it.

use oxichm_core::bitstream::BitReader;
use oxichm_core::error::{ChmError, Result};
use oxichm_lzx::decoder::validate_reset_interval;
use oxichm_lzx::tables::position_slots;

/// Size of the ITSF record.
pub const ITSF_SIZE: usize = 96;
/// Size of the ITSP record.
pub const ITSP_SIZE: usize = 84;
/// Size of the LZXC record.
pub const LZXC_SIZE: usize = 40;

/// File offset of the ITSP record.
pub const ITSP_OFFSET: u64 = ITSF_SIZE as u64;
/// File offset of the LZXC record.
pub const LZXC_OFFSET: u64 = (ITSF_SIZE + ITSP_SIZE) as u64;
/// File offset at which the directory chunk area starts.
pub const DIRECTORY_OFFSET: u64 = (ITSF_SIZE + ITSP_SIZE + LZXC_SIZE) as u64;

/// Sentinel chunk index meaning "no chunk".
pub const NO_CHUNK: u32 = u32::MAX;

fn read_signature(
    reader: &mut BitReader<'_>,
    expected: &'static str,
) -> Result<()> {
    let bytes = reader.read_slice(4)?;
    if bytes != expected.as_bytes() {
        let mut found = [0u8; 4];
        found.copy_from_slice(bytes);
        return Err(ChmError::bad_signature(expected, found));
    }
    Ok(())
}

fn ensure_available(reader: &BitReader<'_>, size: usize) -> Result<()> {
    if reader.remaining_bytes() < size {
        Err(ChmError::truncated(
            reader.byte_pos() as u64,
            size - reader.remaining_bytes(),
        ))
    } else {
        Ok(())
    }
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn as_u32(field: &'static str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| ChmError::invalid_field(field, value))
}

/// The 96-byte record opening every CHM file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItsfHeader {
    /// Declared record length; at least 96.
    pub header_length: u32,
    /// Build timestamp, seconds.
    pub timestamp: u32,
    /// Windows language id of the archive.
    pub language_id: u32,
    /// File offset of the directory chunk area.
    pub directory_offset: u64,
    /// Length of the directory chunk area in bytes.
    pub directory_length: u64,
    /// Reserved fields, preserved verbatim.
    pub reserved: [u32; 5],
}

impl ItsfHeader {
    /// Format version this library reads and writes.
    pub const VERSION: u32 = 3;

    /// Create a header for the fixed write layout.
    pub fn new(timestamp: u32, language_id: u32, directory_length: u64) -> Self {
        Self {
            header_length: ITSF_SIZE as u32,
            timestamp,
            language_id,
            directory_offset: DIRECTORY_OFFSET,
            directory_length,
            reserved: [0; 5],
        }
    }

    /// Parse an ITSF record, consuming exactly 96 bytes.
    pub fn parse(reader: &mut BitReader<'_>) -> Result<Self> {
        let start = reader.byte_pos();
        ensure_available(reader, ITSF_SIZE)?;
        read_signature(reader, "ITSF")?;

        let version = reader.read_u32_le()?;
        if version != Self::VERSION {
            return Err(ChmError::unsupported_version("ITSF", Self::VERSION, version));
        }

        let header_length = reader.read_u32_le()?;
        if (header_length as usize) < ITSF_SIZE {
            return Err(ChmError::invalid_field("header_length", header_length as u64));
        }

        let timestamp = reader.read_u32_le()?;
        let language_id = reader.read_u32_le()?;
        let directory_offset = reader.read_u32_le()? as u64;
        let directory_length = reader.read_u32_le()? as u64;

        if directory_offset <= ITSF_SIZE as u64 {
            return Err(ChmError::invalid_field("directory_offset", directory_offset));
        }

        let mut reserved = [0u32; 5];
        for slot in &mut reserved {
            *slot = reader.read_u32_le()?;
        }

        reader.set_byte_pos(start + ITSF_SIZE)?;
        Ok(Self {
            header_length,
            timestamp,
            language_id,
            directory_offset,
            directory_length,
            reserved,
        })
    }

    /// Serialize to exactly 96 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(ITSF_SIZE);
        out.extend_from_slice(b"ITSF");
        push_u32(&mut out, Self::VERSION);
        push_u32(&mut out, self.header_length);
        push_u32(&mut out, self.timestamp);
        push_u32(&mut out, self.language_id);
        push_u32(&mut out, as_u32("directory_offset", self.directory_offset)?);
        push_u32(&mut out, as_u32("directory_length", self.directory_length)?);
        for &slot in &self.reserved {
            push_u32(&mut out, slot);
        }
        out.resize(ITSF_SIZE, 0);
        Ok(out)
    }
}

/// The 84-byte record describing the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItspHeader {
    /// Directory chunk size in bytes; a power-of-two multiple of 8.
    pub chunk_size: u32,
    /// Quickref density (kept for compatibility, not interpreted).
    pub density: u32,
    /// Depth of the chunk B-tree; 1 when only leaves exist.
    pub depth: u32,
    /// Index of the root index chunk, or [`NO_CHUNK`].
    pub root_chunk: u32,
    /// Index of the first leaf chunk.
    pub first_pmgl: u32,
    /// Index of the last leaf chunk.
    pub last_pmgl: u32,
}

impl ItspHeader {
    /// Format version this library reads and writes.
    pub const VERSION: u32 = 1;

    /// Parse an ITSP record, consuming exactly 84 bytes.
    pub fn parse(reader: &mut BitReader<'_>) -> Result<Self> {
        let start = reader.byte_pos();
        ensure_available(reader, ITSP_SIZE)?;
        read_signature(reader, "ITSP")?;

        let version = reader.read_u32_le()?;
        if version != Self::VERSION {
            return Err(ChmError::unsupported_version("ITSP", Self::VERSION, version));
        }

        let chunk_size = reader.read_u32_le()?;
        if !chunk_size.is_power_of_two() || chunk_size < 8 {
            return Err(ChmError::invalid_field("chunk_size", chunk_size as u64));
        }

        let density = reader.read_u32_le()?;
        let depth = reader.read_u32_le()?;
        let root_chunk = reader.read_u32_le()?;
        let first_pmgl = reader.read_u32_le()?;
        let last_pmgl = reader.read_u32_le()?;

        if first_pmgl > last_pmgl {
            return Err(ChmError::invalid_field("first_pmgl", first_pmgl as u64));
        }

        reader.set_byte_pos(start + ITSP_SIZE)?;
        Ok(Self {
            chunk_size,
            density,
            depth,
            root_chunk,
            first_pmgl,
            last_pmgl,
        })
    }

    /// Serialize to exactly 84 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ITSP_SIZE);
        out.extend_from_slice(b"ITSP");
        push_u32(&mut out, Self::VERSION);
        push_u32(&mut out, self.chunk_size);
        push_u32(&mut out, self.density);
        push_u32(&mut out, self.depth);
        push_u32(&mut out, self.root_chunk);
        push_u32(&mut out, self.first_pmgl);
        push_u32(&mut out, self.last_pmgl);
        out.resize(ITSP_SIZE, 0);
        out
    }
}

/// The 40-byte record with the content section's compression parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LzxcHeader {
    /// Uncompressed bytes between LZX state resets.
    pub reset_interval: u32,
    /// LZX sliding window size.
    pub window_size: u32,
    /// Cache hint carried by the format; not interpreted.
    pub cache_size: u32,
}

impl LzxcHeader {
    /// Format version this library reads and writes.
    pub const VERSION: u32 = 2;

    /// Create a record for the given codec parameters.
    pub fn new(reset_interval: u32, window_size: u32) -> Self {
        Self {
            reset_interval,
            window_size,
            cache_size: 2,
        }
    }

    /// Parse an LZXC record, consuming exactly 40 bytes.
    pub fn parse(reader: &mut BitReader<'_>) -> Result<Self> {
        let start = reader.byte_pos();
        ensure_available(reader, LZXC_SIZE)?;
        read_signature(reader, "LZXC")?;

        let version = reader.read_u32_le()?;
        if version != Self::VERSION {
            return Err(ChmError::unsupported_version("LZXC", Self::VERSION, version));
        }

        let reset_interval = reader.read_u32_le()?;
        validate_reset_interval(reset_interval)?;

        let window_size = reader.read_u32_le()?;
        if position_slots(window_size).is_none() {
            return Err(ChmError::invalid_field("window_size", window_size as u64));
        }

        let cache_size = reader.read_u32_le()?;

        reader.set_byte_pos(start + LZXC_SIZE)?;
        Ok(Self {
            reset_interval,
            window_size,
            cache_size,
        })
    }

    /// Serialize to exactly 40 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(LZXC_SIZE);
        out.extend_from_slice(b"LZXC");
        push_u32(&mut out, Self::VERSION);
        push_u32(&mut out, self.reset_interval);
        push_u32(&mut out, self.window_size);
        push_u32(&mut out, self.cache_size);
        out.resize(LZXC_SIZE, 0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_itsf_roundtrip() {
        let header = ItsfHeader::new(0x5F00_0000, 0x0409, 8192);
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), ITSF_SIZE);
        assert_eq!(&bytes[0..4], b"ITSF");

        let mut reader = BitReader::new(&bytes);
        let parsed = ItsfHeader::parse(&mut reader).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(reader.byte_pos(), ITSF_SIZE);
    }

    #[test]
    fn test_itsf_bad_signature() {
        let mut bytes = ItsfHeader::new(0, 0, 1).to_bytes().unwrap();
        bytes[0] ^= 0x20;
        let mut reader = BitReader::new(&bytes);
        match ItsfHeader::parse(&mut reader) {
            Err(ChmError::BadSignature { expected, found }) => {
                assert_eq!(expected, "ITSF");
                assert_eq!(found[0], b'I' ^ 0x20);
            }
            other => panic!("expected BadSignature, got {:?}", other),
        }
    }

    #[test]
    fn test_itsf_bad_version() {
        let mut bytes = ItsfHeader::new(0, 0, 1).to_bytes().unwrap();
        bytes[4] = 9;
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            ItsfHeader::parse(&mut reader),
            Err(ChmError::UnsupportedVersion {
                header: "ITSF",
                expected: 3,
                found: 9,
            })
        ));
    }

    #[test]
    fn test_itsf_truncated() {
        let bytes = ItsfHeader::new(0, 0, 1).to_bytes().unwrap();
        let mut reader = BitReader::new(&bytes[..50]);
        assert!(matches!(
            ItsfHeader::parse(&mut reader),
            Err(ChmError::HeaderTruncated { needed: 46, .. })
        ));
    }

    #[test]
    fn test_itsf_directory_offset_range() {
        let mut header = ItsfHeader::new(0, 0, 1);
        header.directory_offset = 96;
        let bytes = header.to_bytes().unwrap();
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            ItsfHeader::parse(&mut reader),
            Err(ChmError::InvalidHeaderField {
                field: "directory_offset",
                value: 96,
            })
        ));
    }

    #[test]
    fn test_itsp_roundtrip_and_checks() {
        let header = ItspHeader {
            chunk_size: 4096,
            density: 2,
            depth: 1,
            root_chunk: NO_CHUNK,
            first_pmgl: 0,
            last_pmgl: 3,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), ITSP_SIZE);
        let mut reader = BitReader::new(&bytes);
        assert_eq!(ItspHeader::parse(&mut reader).unwrap(), header);

        let mut bad = header.clone();
        bad.chunk_size = 4095;
        let bytes = bad.to_bytes();
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            ItspHeader::parse(&mut reader),
            Err(ChmError::InvalidHeaderField {
                field: "chunk_size",
                ..
            })
        ));

        let mut bad = header;
        bad.first_pmgl = 5;
        let bytes = bad.to_bytes();
        let mut reader = BitReader::new(&bytes);
        assert!(ItspHeader::parse(&mut reader).is_err());
    }

    #[test]
    fn test_lzxc_roundtrip_and_checks() {
        let header = LzxcHeader::new(0x1_0000, 0x8000);
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), LZXC_SIZE);
        let mut reader = BitReader::new(&bytes);
        assert_eq!(LzxcHeader::parse(&mut reader).unwrap(), header);
        assert_eq!(reader.byte_pos(), LZXC_SIZE);

        // Window size outside the LZX set.
        let bad = LzxcHeader {
            reset_interval: 0x8000,
            window_size: 0x9000,
            cache_size: 2,
        };
        let bytes = bad.to_bytes();
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            LzxcHeader::parse(&mut reader),
            Err(ChmError::InvalidHeaderField {
                field: "window_size",
                ..
            })
        ));

        // Reset interval not a multiple of 0x8000.
        let bad = LzxcHeader {
            reset_interval: 0x8001,
            window_size: 0x8000,
            cache_size: 2,
        };
        let bytes = bad.to_bytes();
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            LzxcHeader::parse(&mut reader),
            Err(ChmError::InvalidHeaderField {
                field: "reset_interval",
                ..
            })
        ));
    }

    #[test]
    fn test_headers_parse_back_to_back() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&ItsfHeader::new(1, 2, 64).to_bytes().unwrap());
        blob.extend_from_slice(
            &ItspHeader {
                chunk_size: 4096,
                density: 2,
                depth: 1,
                root_chunk: NO_CHUNK,
                first_pmgl: 0,
                last_pmgl: 0,
            }
            .to_bytes(),
        );
        blob.extend_from_slice(&LzxcHeader::new(0x8000, 0x1_0000).to_bytes());
        assert_eq!(blob.len() as u64, DIRECTORY_OFFSET);

        let mut reader = BitReader::new(&blob);
        ItsfHeader::parse(&mut reader).unwrap();
        assert_eq!(reader.byte_pos() as u64, ITSP_OFFSET);
        ItspHeader::parse(&mut reader).unwrap();
        assert_eq!(reader.byte_pos() as u64, LZXC_OFFSET);
        LzxcHeader::parse(&mut reader).unwrap();
        assert_eq!(reader.byte_pos() as u64, DIRECTORY_OFFSET);
    }
}
