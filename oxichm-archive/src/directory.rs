//! The CHM directory: PMGL leaf and PMGI index chunks.
//!
//! The directory is an array of fixed-size chunks. Leaf (`PMGL`) chunks carry
//! the entry records; index (`PMGI`) chunks carry separator keys for binary
//! descent. Sequential readers only need the leaves — every entry appears in
//! exactly one — so the parser collects leaf records and skips index chunks.
//!
//! Entry records are ENCINT-packed: `{name_len, name, section, offset,
//! length}` with names sorted ascending by raw byte value within each leaf.

use crate::entry::DirectoryEntry;
use crate::header::{ItspHeader, NO_CHUNK};
use oxichm_core::bitstream::BitReader;
use oxichm_core::encint::{encint_len, read_encint, write_encint};
use oxichm_core::error::{ChmError, Result};
use std::collections::BTreeMap;

/// Leaf chunk signature.
pub const PMGL_SIG: &[u8; 4] = b"PMGL";
/// Index chunk signature.
pub const PMGI_SIG: &[u8; 4] = b"PMGI";

/// Bytes of header at the front of a PMGL chunk.
const PMGL_HEADER_SIZE: usize = 20;
/// Bytes of header at the front of a PMGI chunk.
const PMGI_HEADER_SIZE: usize = 12;

/// Shape of a serialized directory, destined for the ITSP record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryLayout {
    /// Total chunks written.
    pub chunk_count: u32,
    /// Index of the first leaf chunk.
    pub first_pmgl: u32,
    /// Index of the last leaf chunk.
    pub last_pmgl: u32,
    /// 1 for a leaf-only directory, +1 per index level.
    pub depth: u32,
    /// Root index chunk, or [`NO_CHUNK`] when only leaves exist.
    pub root_chunk: u32,
}

/// Parse a directory region into a name-keyed entry map.
///
/// `data` is the full `directory_length` bytes starting at
/// `ITSF.directory_offset`. With `strict` set, unsorted names within a leaf
/// are an error instead of being accepted silently.
pub fn parse_directory(
    data: &[u8],
    itsp: &ItspHeader,
    strict: bool,
) -> Result<BTreeMap<String, DirectoryEntry>> {
    let mut entries = BTreeMap::new();
    if data.is_empty() {
        return Ok(entries);
    }

    let chunk_size = itsp.chunk_size as usize;
    if data.len() % chunk_size != 0 {
        return Err(ChmError::directory_corrupt(
            data.len() as u64,
            "directory length is not a multiple of the chunk size",
        ));
    }

    for (index, chunk) in data.chunks(chunk_size).enumerate() {
        match &chunk[0..4] {
            sig if sig == PMGL_SIG => {
                parse_pmgl(chunk, index as u32, strict, &mut entries)?;
            }
            sig if sig == PMGI_SIG => {
                // Index chunks are redundant for enumeration.
            }
            _ => {
                return Err(ChmError::directory_corrupt(
                    (index * chunk_size) as u64,
                    "unknown chunk signature",
                ));
            }
        }
    }

    Ok(entries)
}

fn parse_pmgl(
    chunk: &[u8],
    chunk_index: u32,
    strict: bool,
    entries: &mut BTreeMap<String, DirectoryEntry>,
) -> Result<()> {
    let base = chunk_index as u64 * chunk.len() as u64;
    let mut reader = BitReader::new(chunk);
    reader.set_byte_pos(4)?;
    let free_space = reader.read_u32_le()? as usize;
    let _reserved = reader.read_u32_le()?;
    let _prev = reader.read_u32_le()?;
    let _next = reader.read_u32_le()?;

    if free_space > chunk.len() - PMGL_HEADER_SIZE {
        return Err(ChmError::directory_corrupt(base, "free space exceeds chunk"));
    }
    let entries_end = chunk.len() - free_space;

    let mut previous_name: Option<String> = None;
    while reader.byte_pos() < entries_end {
        let record_offset = base + reader.byte_pos() as u64;

        let name_len = read_encint(&mut reader)? as usize;
        if name_len == 0 || name_len > entries_end - reader.byte_pos() {
            return Err(ChmError::directory_corrupt(record_offset, "bad name length"));
        }
        let name_bytes = reader.read_slice(name_len)?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| ChmError::directory_corrupt(record_offset, "entry name is not UTF-8"))?
            .to_string();

        let section = read_encint(&mut reader)?;
        if section > 1 {
            return Err(ChmError::directory_corrupt(record_offset, "invalid section id"));
        }
        let offset = read_encint(&mut reader)?;
        let length = read_encint(&mut reader)?;

        if reader.byte_pos() > entries_end {
            return Err(ChmError::directory_corrupt(
                record_offset,
                "entry overruns chunk",
            ));
        }

        if strict {
            if let Some(previous) = &previous_name {
                if name.as_bytes() <= previous.as_bytes() {
                    return Err(ChmError::DirectoryUnsorted { chunk: chunk_index });
                }
            }
        }
        previous_name = Some(name.clone());

        let entry = DirectoryEntry::new(name.clone(), section as u32, offset, length);
        if entries.insert(name, entry).is_some() {
            return Err(ChmError::directory_corrupt(record_offset, "duplicate entry"));
        }
    }

    Ok(())
}

fn encode_entry(entry: &DirectoryEntry) -> Vec<u8> {
    let name = entry.name.as_bytes();
    let mut out = Vec::with_capacity(name.len() + 8);
    write_encint(&mut out, name.len() as u64);
    out.extend_from_slice(name);
    write_encint(&mut out, entry.section as u64);
    write_encint(&mut out, entry.offset);
    write_encint(&mut out, entry.length);
    out
}

/// Serialize a sorted entry list into PMGL chunks plus however many PMGI
/// index levels it takes to reach a single root.
///
/// `entries` must already be sorted ascending by name bytes; records are
/// packed greedily and every chunk is zero-padded to `chunk_size`.
pub fn serialize_directory(
    entries: &[DirectoryEntry],
    chunk_size: usize,
) -> Result<(Vec<u8>, DirectoryLayout)> {
    debug_assert!(entries.windows(2).all(|w| w[0].name < w[1].name));

    if entries.is_empty() {
        return Ok((
            Vec::new(),
            DirectoryLayout {
                chunk_count: 0,
                first_pmgl: 0,
                last_pmgl: 0,
                depth: 1,
                root_chunk: NO_CHUNK,
            },
        ));
    }

    // Greedy fill of leaf chunks.
    let leaf_capacity = chunk_size - PMGL_HEADER_SIZE;
    let mut leaves: Vec<Vec<u8>> = Vec::new();
    let mut leaf_keys: Vec<&str> = Vec::new();
    let mut current = Vec::new();

    for entry in entries {
        let record = encode_entry(entry);
        if record.len() > leaf_capacity {
            return Err(ChmError::encoder(format!(
                "entry {} does not fit in a {} byte chunk",
                entry.name, chunk_size
            )));
        }
        if current.len() + record.len() > leaf_capacity {
            leaves.push(std::mem::take(&mut current));
        }
        if current.is_empty() {
            leaf_keys.push(&entry.name);
        }
        current.extend_from_slice(&record);
    }
    leaves.push(current);

    let leaf_count = leaves.len() as u32;
    let mut chunks: Vec<Vec<u8>> = Vec::with_capacity(leaves.len() + 1);
    for (index, body) in leaves.iter().enumerate() {
        let mut chunk = Vec::with_capacity(chunk_size);
        chunk.extend_from_slice(PMGL_SIG);
        chunk.extend_from_slice(&((leaf_capacity - body.len()) as u32).to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes());
        let prev = if index == 0 { NO_CHUNK } else { index as u32 - 1 };
        let next = if index + 1 == leaves.len() {
            NO_CHUNK
        } else {
            index as u32 + 1
        };
        chunk.extend_from_slice(&prev.to_le_bytes());
        chunk.extend_from_slice(&next.to_le_bytes());
        chunk.extend_from_slice(body);
        chunk.resize(chunk_size, 0);
        chunks.push(chunk);
    }

    // Index levels until a level fits in one chunk.
    let mut depth = 1u32;
    let mut root_chunk = NO_CHUNK;
    let mut level: Vec<(String, u32)> = leaf_keys
        .iter()
        .enumerate()
        .map(|(index, &key)| (key.to_string(), index as u32))
        .collect();

    while level.len() > 1 {
        depth += 1;
        let mut next_level = Vec::new();
        let index_capacity = chunk_size - PMGI_HEADER_SIZE;
        let mut body = Vec::new();
        let mut first_key: Option<String> = None;

        let flush = |body: &mut Vec<u8>,
                     first_key: &mut Option<String>,
                     chunks: &mut Vec<Vec<u8>>,
                     next_level: &mut Vec<(String, u32)>| {
            if body.is_empty() {
                return;
            }
            let mut chunk = Vec::with_capacity(chunk_size);
            chunk.extend_from_slice(PMGI_SIG);
            chunk.extend_from_slice(&((index_capacity - body.len()) as u32).to_le_bytes());
            chunk.extend_from_slice(&0u32.to_le_bytes());
            chunk.extend_from_slice(body);
            chunk.resize(chunk_size, 0);
            body.clear();
            let chunk_index = chunks.len() as u32;
            chunks.push(chunk);
            if let Some(key) = first_key.take() {
                next_level.push((key, chunk_index));
            }
        };

        for (key, child) in &level {
            let mut record = Vec::with_capacity(key.len() + 4);
            write_encint(&mut record, key.len() as u64);
            record.extend_from_slice(key.as_bytes());
            write_encint(&mut record, *child as u64);

            if record.len() > index_capacity {
                return Err(ChmError::encoder(format!(
                    "index key {} does not fit in a {} byte chunk",
                    key, chunk_size
                )));
            }
            if body.len() + record.len() > index_capacity {
                flush(&mut body, &mut first_key, &mut chunks, &mut next_level);
            }
            if first_key.is_none() {
                first_key = Some(key.clone());
            }
            body.extend_from_slice(&record);
        }
        flush(&mut body, &mut first_key, &mut chunks, &mut next_level);

        root_chunk = chunks.len() as u32 - 1;
        level = next_level;
    }

    let layout = DirectoryLayout {
        chunk_count: chunks.len() as u32,
        first_pmgl: 0,
        last_pmgl: leaf_count - 1,
        depth,
        root_chunk,
    };

    let mut data = Vec::with_capacity(chunks.len() * chunk_size);
    for chunk in chunks {
        data.extend_from_slice(&chunk);
    }
    Ok((data, layout))
}

/// Bytes one entry occupies inside a leaf chunk.
pub fn entry_record_len(entry: &DirectoryEntry) -> usize {
    let name = entry.name.len();
    encint_len(name as u64)
        + name
        + encint_len(entry.section as u64)
        + encint_len(entry.offset)
        + encint_len(entry.length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn itsp(chunk_size: u32) -> ItspHeader {
        ItspHeader {
            chunk_size,
            density: 2,
            depth: 1,
            root_chunk: NO_CHUNK,
            first_pmgl: 0,
            last_pmgl: 0,
        }
    }

    fn sample_entries(count: usize) -> Vec<DirectoryEntry> {
        (0..count)
            .map(|i| DirectoryEntry::new(format!("/file{:05}.html", i), 1, i as u64 * 100, 100))
            .collect()
    }

    #[test]
    fn test_roundtrip_single_chunk() {
        let entries = sample_entries(5);
        let (data, layout) = serialize_directory(&entries, 4096).unwrap();
        assert_eq!(data.len(), 4096);
        assert_eq!(layout.chunk_count, 1);
        assert_eq!(layout.depth, 1);
        assert_eq!(layout.root_chunk, NO_CHUNK);
        assert_eq!(layout.last_pmgl, 0);

        let parsed = parse_directory(&data, &itsp(4096), true).unwrap();
        assert_eq!(parsed.len(), 5);
        for entry in &entries {
            assert_eq!(parsed.get(&entry.name), Some(entry));
        }
    }

    #[test]
    fn test_roundtrip_multi_chunk_with_index() {
        let entries = sample_entries(500);
        let (data, layout) = serialize_directory(&entries, 1024).unwrap();
        assert!(layout.chunk_count > 2);
        assert_eq!(layout.depth, 2);
        assert_ne!(layout.root_chunk, NO_CHUNK);
        assert!(layout.last_pmgl < layout.root_chunk);
        assert_eq!(data.len(), layout.chunk_count as usize * 1024);

        let parsed = parse_directory(&data, &itsp(1024), true).unwrap();
        assert_eq!(parsed.len(), 500);
        assert_eq!(parsed.get("/file00499.html").unwrap().offset, 499 * 100);
    }

    #[test]
    fn test_empty_directory() {
        let (data, layout) = serialize_directory(&[], 4096).unwrap();
        assert!(data.is_empty());
        assert_eq!(layout.chunk_count, 0);
        let parsed = parse_directory(&data, &itsp(4096), true).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_unknown_chunk_signature() {
        let entries = sample_entries(1);
        let (mut data, _) = serialize_directory(&entries, 4096).unwrap();
        data[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            parse_directory(&data, &itsp(4096), false),
            Err(ChmError::DirectoryCorrupt { .. })
        ));
    }

    #[test]
    fn test_unsorted_detected_in_strict_mode() {
        // Hand-build a leaf whose two entries are out of order.
        let a = DirectoryEntry::new("/b.html", 0, 0, 1);
        let b = DirectoryEntry::new("/a.html", 0, 1, 1);
        let mut body = encode_entry(&a);
        body.extend_from_slice(&encode_entry(&b));

        let chunk_size = 256usize;
        let mut chunk = Vec::new();
        chunk.extend_from_slice(PMGL_SIG);
        chunk.extend_from_slice(&((chunk_size - PMGL_HEADER_SIZE - body.len()) as u32).to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes());
        chunk.extend_from_slice(&NO_CHUNK.to_le_bytes());
        chunk.extend_from_slice(&NO_CHUNK.to_le_bytes());
        chunk.extend_from_slice(&body);
        chunk.resize(chunk_size, 0);

        assert!(matches!(
            parse_directory(&chunk, &itsp(256), true),
            Err(ChmError::DirectoryUnsorted { chunk: 0 })
        ));
        // Lenient mode accepts the same bytes.
        let parsed = parse_directory(&chunk, &itsp(256), false).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_corrupt_name_length() {
        let entries = sample_entries(1);
        let (mut data, _) = serialize_directory(&entries, 4096).unwrap();
        // First record byte is the name-length ENCINT; blow it up.
        data[PMGL_HEADER_SIZE] = 0x7F;
        assert!(matches!(
            parse_directory(&data, &itsp(4096), false),
            Err(ChmError::DirectoryCorrupt { .. })
        ));
    }

    #[test]
    fn test_free_space_accurate() {
        let entries = sample_entries(3);
        let (data, _) = serialize_directory(&entries, 4096).unwrap();
        let used: usize = entries.iter().map(entry_record_len).sum();
        let free = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        assert_eq!(free, 4096 - PMGL_HEADER_SIZE - used);
    }

    #[test]
    fn test_prev_next_links() {
        let entries = sample_entries(300);
        let (data, layout) = serialize_directory(&entries, 1024).unwrap();
        let leaves = layout.last_pmgl as usize + 1;
        for index in 0..leaves {
            let chunk = &data[index * 1024..(index + 1) * 1024];
            let prev = u32::from_le_bytes([chunk[12], chunk[13], chunk[14], chunk[15]]);
            let next = u32::from_le_bytes([chunk[16], chunk[17], chunk[18], chunk[19]]);
            if index == 0 {
                assert_eq!(prev, NO_CHUNK);
            } else {
                assert_eq!(prev, index as u32 - 1);
            }
            if index == leaves - 1 {
                assert_eq!(next, NO_CHUNK);
            } else {
                assert_eq!(next, index as u32 + 1);
            }
        }
    }
}
