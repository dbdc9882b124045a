//! The read facade: open a CHM, enumerate it, extract from it.
//!
//! [`ChmReader::open`] parses the three fixed headers, walks the directory
//! into an entry map, and resolves the compressed section through its named
//! system entries. All of that state is immutable for the life of the
//! reader; the only mutable piece is the LZX decoder, created lazily on the
//! first compressed extraction and reset per request, so extractions are
//! order-independent.

use crate::directory::parse_directory;
use crate::entry::{
    normalize_name, ArchiveInfo, DirectoryEntry, EntryStat, CONTENT_NAME, CONTROL_DATA_NAME,
    RESET_TABLE_NAME, SECTION_COMPRESSED, SECTION_UNCOMPRESSED,
};
use crate::header::{ItsfHeader, ItspHeader, LzxcHeader, DIRECTORY_OFFSET};
use crate::reset_table::ResetTable;
use oxichm_core::bitstream::BitReader;
use oxichm_core::error::{ChmError, Result};
use oxichm_core::mmap::MmapSource;
use oxichm_core::traits::{ByteSource, CancelToken};
use oxichm_lzx::LzxDecoder;
use std::collections::BTreeMap;
use std::path::Path;

/// Policies applied while opening an archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Fail with `DirectoryUnsorted` when leaf entries are out of order.
    pub strict: bool,
    /// Fall back to a linear-scan extract path when the reset table is
    /// missing or corrupt, instead of failing to open.
    pub tolerate_missing_reset_table: bool,
}

/// An open CHM archive.
pub struct ChmReader<S> {
    source: S,
    itsf: ItsfHeader,
    itsp: ItspHeader,
    lzxc: LzxcHeader,
    entries: BTreeMap<String, DirectoryEntry>,
    reset_table: Option<ResetTable>,
    section0_base: u64,
    content_base: u64,
    content_length: u64,
    decoder: Option<LzxDecoder>,
}

impl ChmReader<MmapSource> {
    /// Memory-map a file and open it.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(MmapSource::open(path)?)
    }
}

impl<S: ByteSource> ChmReader<S> {
    /// Open an archive with default options.
    pub fn open(source: S) -> Result<Self> {
        Self::open_with(source, &OpenOptions::default())
    }

    /// Open an archive.
    pub fn open_with(source: S, options: &OpenOptions) -> Result<Self> {
        let file_len = source.len();
        if file_len < DIRECTORY_OFFSET {
            return Err(ChmError::truncated(
                file_len,
                (DIRECTORY_OFFSET - file_len) as usize,
            ));
        }

        let head = source.read_vec_at(0, DIRECTORY_OFFSET as usize)?;
        let mut reader = BitReader::new(&head);
        let itsf = ItsfHeader::parse(&mut reader)?;
        let itsp = ItspHeader::parse(&mut reader)?;
        let lzxc = LzxcHeader::parse(&mut reader)?;

        let dir_end = itsf
            .directory_offset
            .checked_add(itsf.directory_length)
            .ok_or_else(|| ChmError::invalid_field("directory_length", itsf.directory_length))?;
        if dir_end > file_len {
            return Err(ChmError::truncated(
                itsf.directory_offset,
                (dir_end - file_len) as usize,
            ));
        }

        let dir_bytes =
            source.read_vec_at(itsf.directory_offset, itsf.directory_length as usize)?;
        let entries = parse_directory(&dir_bytes, &itsp, options.strict)?;

        let section0_base = dir_end;
        let mut archive = Self {
            source,
            itsf,
            itsp,
            lzxc,
            entries,
            reset_table: None,
            section0_base,
            content_base: section0_base,
            content_length: 0,
            decoder: None,
        };
        archive.resolve_compressed_section(options)?;
        Ok(archive)
    }

    /// Locate the LZX stream and its reset table through their directory
    /// entries, when any entry actually lives in section 1.
    fn resolve_compressed_section(&mut self, options: &OpenOptions) -> Result<()> {
        let has_compressed = self
            .entries
            .values()
            .any(|entry| entry.section == SECTION_COMPRESSED);
        if !has_compressed {
            return Ok(());
        }

        let content = self
            .entries
            .get(CONTENT_NAME)
            .filter(|entry| entry.section == SECTION_UNCOMPRESSED)
            .ok_or_else(|| {
                ChmError::directory_corrupt(0, "compressed entries but no content entry")
            })?
            .clone();
        let content_base = self.section0_base + content.offset;
        if content_base + content.length > self.source.len() {
            return Err(ChmError::truncated(
                content_base,
                (content_base + content.length - self.source.len()) as usize,
            ));
        }
        self.content_base = content_base;
        self.content_length = content.length;

        // The LZXC copy stored in the directory must agree with the record
        // at the front of the file.
        if let Some(control) = self.entries.get(CONTROL_DATA_NAME) {
            if control.section == SECTION_UNCOMPRESSED {
                let bytes = self
                    .source
                    .read_vec_at(self.section0_base + control.offset, control.length as usize)?;
                let mut reader = BitReader::new(&bytes);
                let copy = LzxcHeader::parse(&mut reader)?;
                if copy.window_size != self.lzxc.window_size
                    || copy.reset_interval != self.lzxc.reset_interval
                {
                    return Err(ChmError::invalid_field(
                        "control_data",
                        copy.window_size as u64,
                    ));
                }
            }
        }

        let parsed = match self.entries.get(RESET_TABLE_NAME) {
            Some(entry) if entry.section == SECTION_UNCOMPRESSED => {
                let bytes = self
                    .source
                    .read_vec_at(self.section0_base + entry.offset, entry.length as usize)?;
                ResetTable::parse(&bytes)
            }
            _ => Err(ChmError::reset_table("reset table entry missing")),
        };

        match parsed {
            Ok(table) => {
                // Every compressed entry must fit inside the section.
                for entry in self.entries.values() {
                    if entry.section == SECTION_COMPRESSED
                        && entry.offset + entry.length > table.total_uncompressed
                    {
                        return Err(ChmError::directory_corrupt(
                            0,
                            format!("entry {} extends past the section end", entry.name),
                        ));
                    }
                }
                self.reset_table = Some(table);
                Ok(())
            }
            // A reader without a table still works: extraction degrades to
            // scanning the section from the start.
            Err(_) if options.tolerate_missing_reset_table => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// The parsed ITSF header.
    pub fn itsf(&self) -> &ItsfHeader {
        &self.itsf
    }

    /// The parsed ITSP header.
    pub fn itsp(&self) -> &ItspHeader {
        &self.itsp
    }

    /// The parsed LZXC header.
    pub fn lzxc(&self) -> &LzxcHeader {
        &self.lzxc
    }

    /// The parsed reset table, if the archive has a compressed section.
    pub fn reset_table(&self) -> Option<&ResetTable> {
        self.reset_table.as_ref()
    }

    /// Content entry names in sorted order; system entries are skipped.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .values()
            .filter(|entry| !entry.is_system())
            .map(|entry| entry.name.as_str())
    }

    /// Number of content entries.
    pub fn entry_count(&self) -> usize {
        self.names().count()
    }

    /// Whether `name` resolves to an entry.
    pub fn exists(&self, name: &str) -> bool {
        self.find_entry(name).is_some()
    }

    /// Stat an entry by name.
    pub fn stat(&self, name: &str) -> Result<EntryStat> {
        let entry = self
            .find_entry(name)
            .ok_or_else(|| ChmError::entry_not_found(name))?;
        Ok(EntryStat {
            compressed: entry.is_compressed(),
            length: entry.length,
            section: entry.section,
        })
    }

    /// Extract an entry's bytes.
    pub fn extract(&mut self, name: &str) -> Result<Vec<u8>> {
        self.extract_inner(name, None)
    }

    /// Extract, polling `cancel` between LZX blocks.
    pub fn extract_with_cancel(&mut self, name: &str, cancel: &CancelToken) -> Result<Vec<u8>> {
        self.extract_inner(name, Some(cancel))
    }

    fn extract_inner(&mut self, name: &str, cancel: Option<&CancelToken>) -> Result<Vec<u8>> {
        let entry = self
            .find_entry(name)
            .ok_or_else(|| ChmError::entry_not_found(name))?
            .clone();

        if entry.length == 0 {
            return Ok(Vec::new());
        }

        match entry.section {
            SECTION_UNCOMPRESSED => self
                .source
                .read_vec_at(self.section0_base + entry.offset, entry.length as usize),
            _ => self
                .read_compressed_range(entry.offset, entry.length, cancel)
                .map_err(|err| match err {
                    ChmError::Cancelled => ChmError::Cancelled,
                    other => other.extract_context(&entry.name, entry.offset),
                }),
        }
    }

    /// Archive statistics over the content entries.
    pub fn info(&self) -> ArchiveInfo {
        let mut file_count = 0usize;
        let mut total_uncompressed = 0u64;
        let mut stored = 0u64;
        for entry in self.entries.values().filter(|entry| !entry.is_system()) {
            file_count += 1;
            total_uncompressed += entry.length;
            if entry.section == SECTION_UNCOMPRESSED {
                stored += entry.length;
            }
        }
        let total_compressed = stored + self.content_length;
        let ratio = if total_uncompressed == 0 {
            1.0
        } else {
            total_compressed as f64 / total_uncompressed as f64
        };
        ArchiveInfo {
            file_count,
            total_uncompressed,
            total_compressed,
            ratio,
        }
    }

    /// Exact lookup, then normalized, then a case-insensitive scan.
    fn find_entry(&self, name: &str) -> Option<&DirectoryEntry> {
        if let Some(entry) = self.entries.get(name) {
            return Some(entry);
        }
        let normalized = normalize_name(name);
        if let Some(entry) = self.entries.get(&normalized) {
            return Some(entry);
        }
        self.entries
            .values()
            .find(|entry| entry.name.eq_ignore_ascii_case(&normalized))
    }

    fn take_decoder(&mut self) -> Result<LzxDecoder> {
        match self.decoder.take() {
            Some(decoder) => Ok(decoder),
            None => LzxDecoder::new(self.lzxc.window_size, self.lzxc.reset_interval),
        }
    }

    /// Decode `[start, start + length)` of the compressed section's
    /// uncompressed stream.
    fn read_compressed_range(
        &mut self,
        start: u64,
        length: u64,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<u8>> {
        let mut decoder = self.take_decoder()?;
        let result = match &self.reset_table {
            Some(table) => self.indexed_range(&mut decoder, table, start, length, cancel),
            None => self.linear_range(&mut decoder, start, length, cancel),
        };
        self.decoder = Some(decoder);
        result
    }

    /// Random access: decode only the intervals overlapping the range.
    fn indexed_range(
        &self,
        decoder: &mut LzxDecoder,
        table: &ResetTable,
        start: u64,
        length: u64,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(length as usize);
        let mut index = table.interval_for(start)?;

        while (output.len() as u64) < length {
            if index + 1 >= table.entries.len() {
                return Err(ChmError::TruncatedBlock);
            }
            let lo = table.entries[index];
            let hi = table.entries[index + 1];
            let span = self.source.read_vec_at(
                self.content_base + lo.compressed,
                (hi.compressed - lo.compressed) as usize,
            )?;
            let expected = (hi.uncompressed - lo.uncompressed) as usize;
            let (chunk, _) = decoder.decode_interval(&span, expected, cancel)?;
            if chunk.len() != expected {
                return Err(ChmError::TruncatedBlock);
            }

            let skip = start.saturating_sub(lo.uncompressed) as usize;
            let need = length as usize - output.len();
            let end = (skip + need).min(chunk.len());
            output.extend_from_slice(&chunk[skip..end]);
            index += 1;
        }

        Ok(output)
    }

    /// Fallback without a reset table: decode the section from its start,
    /// interval by interval, discarding bytes before the range.
    fn linear_range(
        &self,
        decoder: &mut LzxDecoder,
        start: u64,
        length: u64,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<u8>> {
        let data = self
            .source
            .read_vec_at(self.content_base, self.content_length as usize)?;
        let interval = self.lzxc.reset_interval as usize;
        let end = start + length;

        let mut output = Vec::with_capacity(length as usize);
        let mut position = 0usize;
        let mut produced = 0u64;

        while produced < end {
            if position >= data.len() {
                return Err(ChmError::TruncatedBlock);
            }
            let (chunk, consumed) = decoder.decode_interval(&data[position..], interval, cancel)?;
            if chunk.is_empty() {
                return Err(ChmError::TruncatedBlock);
            }
            let chunk_start = produced;
            let chunk_end = produced + chunk.len() as u64;
            if chunk_end > start {
                let from = start.saturating_sub(chunk_start) as usize;
                let to = (end.min(chunk_end) - chunk_start) as usize;
                output.extend_from_slice(&chunk[from..to]);
            }
            produced = chunk_end;
            position += consumed;
        }

        Ok(output)
    }
}

impl<S> std::fmt::Debug for ChmReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChmReader")
            .field("entries", &self.entries.len())
            .field("section0_base", &self.section0_base)
            .field("content_length", &self.content_length)
            .field("has_reset_table", &self.reset_table.is_some())
            .finish()
    }
}
