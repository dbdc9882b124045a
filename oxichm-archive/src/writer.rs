//! The write facade: pack named byte streams into a CHM.
//!
//! Layout produced, in file order: ITSF, ITSP and LZXC at their fixed
//! offsets, the directory chunk area, then the section-0 content. When
//! compression is on, the user entries are concatenated (in sorted name
//! order) into one uncompressed stream, LZX-encoded, and the resulting
//! byte stream lands in section 0 as three system entries: the LZXC copy
//! (`ControlData`), the reset table and the `Content` stream itself.

use crate::directory::serialize_directory;
use crate::entry::{
    normalize_name, DirectoryEntry, CONTENT_NAME, CONTROL_DATA_NAME, RESET_TABLE_NAME,
    SECTION_COMPRESSED, SECTION_UNCOMPRESSED,
};
use crate::header::{ItsfHeader, ItspHeader, LzxcHeader, LZXC_SIZE};
use crate::reset_table::ResetTable;
use oxichm_core::error::{ChmError, Result};
use oxichm_core::traits::ByteSink;
use oxichm_lzx::LzxEncoder;

/// Parameters for [`pack`].
#[derive(Debug, Clone, Copy)]
pub struct PackOptions {
    /// LZX sliding window size; one of the seven sizes LZX defines.
    pub window_size: u32,
    /// Uncompressed bytes between LZX state resets; a multiple of 0x8000.
    pub reset_interval: u32,
    /// Store entries LZX-compressed (section 1) instead of raw (section 0).
    pub compression: bool,
    /// Directory chunk size.
    pub chunk_size: u32,
    /// Windows language id stamped into the ITSF header.
    pub language_id: u32,
    /// Timestamp stamped into the ITSF header, seconds.
    pub timestamp: u32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            window_size: 0x1_0000,
            reset_interval: 0x8000,
            compression: true,
            chunk_size: 4096,
            language_id: 0x0409,
            timestamp: 0,
        }
    }
}

/// Pack `(name, bytes)` pairs into a CHM written to `sink`.
///
/// Names are normalized (leading `/`, backslashes folded); the `::` system
/// namespace is reserved for the archive's own bookkeeping entries.
pub fn pack<I, N, D, S>(entries: I, sink: &mut S, options: &PackOptions) -> Result<()>
where
    I: IntoIterator<Item = (N, D)>,
    N: AsRef<str>,
    D: AsRef<[u8]>,
    S: ByteSink,
{
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    for (name, data) in entries {
        let raw = name.as_ref();
        if raw.starts_with("::") {
            return Err(ChmError::encoder(format!(
                "name {} is in the reserved system namespace",
                raw
            )));
        }
        let normalized = normalize_name(raw);
        if normalized == "/" {
            return Err(ChmError::encoder("empty entry name"));
        }
        files.push((normalized, data.as_ref().to_vec()));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    for pair in files.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(ChmError::encoder(format!("duplicate entry {}", pair[0].0)));
        }
    }

    let total_len: u64 = files.iter().map(|(_, data)| data.len() as u64).sum();
    let compress = options.compression && total_len > 0;

    let mut dir_entries: Vec<DirectoryEntry> = Vec::with_capacity(files.len() + 3);
    let mut section0: Vec<u8> = Vec::new();

    if compress {
        // Concatenate the sorted files into the uncompressed stream; each
        // entry's offset is a stream offset, not a file offset.
        let mut stream = Vec::with_capacity(total_len as usize);
        for (name, data) in &files {
            dir_entries.push(DirectoryEntry::new(
                name.clone(),
                SECTION_COMPRESSED,
                stream.len() as u64,
                data.len() as u64,
            ));
            stream.extend_from_slice(data);
        }

        let encoder = LzxEncoder::new(options.window_size, options.reset_interval)?;
        let section = encoder.encode_section(&stream)?;
        let table = ResetTable::from_boundaries(
            &section.boundaries,
            section.data.len() as u64,
            stream.len() as u64,
            options.reset_interval,
        );
        let table_bytes = table.to_bytes();
        let control = LzxcHeader::new(options.reset_interval, options.window_size).to_bytes();

        let mut offset = 0u64;
        dir_entries.push(DirectoryEntry::new(
            CONTROL_DATA_NAME,
            SECTION_UNCOMPRESSED,
            offset,
            control.len() as u64,
        ));
        offset += control.len() as u64;
        dir_entries.push(DirectoryEntry::new(
            RESET_TABLE_NAME,
            SECTION_UNCOMPRESSED,
            offset,
            table_bytes.len() as u64,
        ));
        offset += table_bytes.len() as u64;
        dir_entries.push(DirectoryEntry::new(
            CONTENT_NAME,
            SECTION_UNCOMPRESSED,
            offset,
            section.data.len() as u64,
        ));

        debug_assert_eq!(control.len(), LZXC_SIZE);
        section0.extend_from_slice(&control);
        section0.extend_from_slice(&table_bytes);
        section0.extend_from_slice(&section.data);
    } else {
        for (name, data) in &files {
            dir_entries.push(DirectoryEntry::new(
                name.clone(),
                SECTION_UNCOMPRESSED,
                section0.len() as u64,
                data.len() as u64,
            ));
            section0.extend_from_slice(data);
        }
    }

    dir_entries.sort_by(|a, b| a.name.cmp(&b.name));
    let (dir_bytes, layout) = serialize_directory(&dir_entries, options.chunk_size as usize)?;

    let itsf = ItsfHeader::new(options.timestamp, options.language_id, dir_bytes.len() as u64);
    let itsp = ItspHeader {
        chunk_size: options.chunk_size,
        density: 2,
        depth: layout.depth,
        root_chunk: layout.root_chunk,
        first_pmgl: layout.first_pmgl,
        last_pmgl: layout.last_pmgl,
    };
    let lzxc = LzxcHeader::new(options.reset_interval, options.window_size);

    sink.write_all(&itsf.to_bytes()?)?;
    sink.write_all(&itsp.to_bytes())?;
    sink.write_all(&lzxc.to_bytes())?;
    sink.write_all(&dir_bytes)?;
    sink.write_all(&section0)?;
    Ok(())
}
