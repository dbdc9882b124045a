//! The LZX reset table: the index that buys random access.
//!
//! The compressed section is a sequence of reset intervals, each decodable
//! on its own. The reset table records where every interval starts on both
//! axes — compressed bytes and uncompressed bytes — as cumulative offsets
//! from the start of the section, ending with a sentinel equal to the
//! section totals. Extraction binary-searches the uncompressed axis, seeks
//! to the matching compressed offset, and decodes only the intervals an
//! entry actually touches.
//!
//! The record is stored as an ordinary section-0 entry (see
//! [`crate::entry::RESET_TABLE_NAME`]) and always located through the
//! directory, never through an ambient cursor.

use oxichm_core::bitstream::BitReader;
use oxichm_core::error::{ChmError, Result};

/// Record version this library reads and writes.
pub const RESET_TABLE_VERSION: u32 = 2;

/// Bytes per stored offset; each table row is a pair of these.
pub const RESET_ENTRY_SIZE: u32 = 8;

/// Fixed header bytes before the offset rows.
const HEADER_SIZE: usize = 40;

/// One reset boundary: cumulative offsets from the section start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetEntry {
    /// Compressed offset of the interval.
    pub compressed: u64,
    /// Uncompressed offset of the interval.
    pub uncompressed: u64,
}

/// The parsed reset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetTable {
    /// Uncompressed bytes per interval (the LZXC reset interval).
    pub block_size: u32,
    /// Total uncompressed length of the section.
    pub total_uncompressed: u64,
    /// Total compressed length of the section.
    pub total_compressed: u64,
    /// Interval boundaries from `(0, 0)` up to and including the sentinel
    /// equal to the totals.
    pub entries: Vec<ResetEntry>,
}

impl ResetTable {
    /// Build a table from encoder boundaries plus the section totals.
    pub fn from_boundaries(
        boundaries: &[(u64, u64)],
        total_compressed: u64,
        total_uncompressed: u64,
        block_size: u32,
    ) -> Self {
        let mut entries: Vec<ResetEntry> = boundaries
            .iter()
            .map(|&(compressed, uncompressed)| ResetEntry {
                compressed,
                uncompressed,
            })
            .collect();
        entries.push(ResetEntry {
            compressed: total_compressed,
            uncompressed: total_uncompressed,
        });
        Self {
            block_size,
            total_uncompressed,
            total_compressed,
            entries,
        }
    }

    /// Parse and validate a reset table record.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ChmError::reset_table("record shorter than its header"));
        }
        let mut reader = BitReader::new(bytes);

        let version = reader.read_u32_le()?;
        if version != RESET_TABLE_VERSION {
            return Err(ChmError::reset_table(format!(
                "unsupported version {}",
                version
            )));
        }
        let block_count = reader.read_u32_le()? as usize;
        let entry_size = reader.read_u32_le()?;
        if entry_size != RESET_ENTRY_SIZE {
            return Err(ChmError::reset_table(format!(
                "unsupported entry size {}",
                entry_size
            )));
        }
        let table_offset = reader.read_u32_le()? as usize;
        let total_uncompressed = reader.read_u64_le()?;
        let total_compressed = reader.read_u64_le()?;
        let block_size = reader.read_u32_le()?;

        let row_bytes = 2 * RESET_ENTRY_SIZE as usize;
        let rows_end = block_count
            .checked_mul(row_bytes)
            .and_then(|len| table_offset.checked_add(len));
        if table_offset < HEADER_SIZE || rows_end.map(|end| end > bytes.len()).unwrap_or(true) {
            return Err(ChmError::reset_table("offset rows outside the record"));
        }

        reader.set_byte_pos(table_offset)?;
        let mut entries = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            let compressed = reader.read_u64_le()?;
            let uncompressed = reader.read_u64_le()?;
            entries.push(ResetEntry {
                compressed,
                uncompressed,
            });
        }

        let table = Self {
            block_size,
            total_uncompressed,
            total_compressed,
            entries,
        };
        table.validate()?;
        Ok(table)
    }

    /// Check the table invariants: rows strictly increase on both axes,
    /// start at `(0, 0)`, and end at the section totals.
    pub fn validate(&self) -> Result<()> {
        let first = self
            .entries
            .first()
            .ok_or_else(|| ChmError::reset_table("no rows"))?;
        if first.compressed != 0 || first.uncompressed != 0 {
            return Err(ChmError::reset_table("first row is not (0, 0)"));
        }

        for pair in self.entries.windows(2) {
            if pair[1].compressed <= pair[0].compressed
                || pair[1].uncompressed <= pair[0].uncompressed
            {
                return Err(ChmError::reset_table("rows are not strictly increasing"));
            }
        }

        let last = self.entries[self.entries.len() - 1];
        if last.compressed != self.total_compressed || last.uncompressed != self.total_uncompressed
        {
            return Err(ChmError::reset_table("last row does not match the totals"));
        }

        Ok(())
    }

    /// Serialize to the on-disk record layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.entries.len() * 16);
        out.extend_from_slice(&RESET_TABLE_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&RESET_ENTRY_SIZE.to_le_bytes());
        out.extend_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
        out.extend_from_slice(&self.total_uncompressed.to_le_bytes());
        out.extend_from_slice(&self.total_compressed.to_le_bytes());
        out.extend_from_slice(&self.block_size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.compressed.to_le_bytes());
            out.extend_from_slice(&entry.uncompressed.to_le_bytes());
        }
        out
    }

    /// Number of decodable intervals (rows minus the sentinel).
    pub fn interval_count(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    /// Index of the interval containing uncompressed offset `offset`.
    pub fn interval_for(&self, offset: u64) -> Result<usize> {
        if offset >= self.total_uncompressed {
            return Err(ChmError::reset_table(format!(
                "offset {} beyond section end {}",
                offset, self.total_uncompressed
            )));
        }
        let index = self
            .entries
            .partition_point(|entry| entry.uncompressed <= offset);
        Ok(index - 1)
    }
}
