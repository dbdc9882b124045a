//! Malformed-archive behavior: every corruption is a typed error, never a
//! panic, and a dropped reader poisons nothing.

use oxichm_archive::{pack, ChmReader, OpenOptions, PackOptions};
use oxichm_core::error::ChmError;

fn pseudo_random(seed: u32, len: usize) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}

fn valid_archive(data_len: usize) -> (Vec<u8>, Vec<u8>) {
    let data = pseudo_random(0x1234, data_len);
    let mut out: Vec<u8> = Vec::new();
    pack(
        vec![("/payload.bin", data.clone())],
        &mut out,
        &PackOptions::default(),
    )
    .unwrap();
    (out, data)
}

fn directory_length(bytes: &[u8]) -> usize {
    u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]) as usize
}

#[test]
fn tampered_itsf_signature() {
    let (mut bytes, _) = valid_archive(100);
    bytes[1] ^= 0x01; // "ITSF" -> "IUSF"
    match ChmReader::open(bytes) {
        Err(ChmError::BadSignature { expected, found }) => {
            assert_eq!(expected, "ITSF");
            assert_eq!(&found[..1], b"I");
        }
        other => panic!("expected BadSignature, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn tampered_itsp_version() {
    let (mut bytes, _) = valid_archive(100);
    bytes[100] = 42; // ITSP version field at offset 96 + 4
    assert!(matches!(
        ChmReader::open(bytes),
        Err(ChmError::UnsupportedVersion {
            header: "ITSP",
            found: 42,
            ..
        })
    ));
}

#[test]
fn tampered_lzxc_window() {
    let (mut bytes, _) = valid_archive(100);
    bytes[192] = 0x12; // LZXC window_size field at offset 180 + 12
    assert!(matches!(
        ChmReader::open(bytes),
        Err(ChmError::InvalidHeaderField {
            field: "window_size",
            ..
        })
    ));
}

#[test]
fn truncated_directory() {
    let (bytes, _) = valid_archive(100);
    let dir_end = 220 + directory_length(&bytes);
    let truncated = bytes[..dir_end - 1].to_vec();
    assert!(matches!(
        ChmReader::open(truncated),
        Err(ChmError::HeaderTruncated { .. } | ChmError::DirectoryCorrupt { .. })
    ));
}

#[test]
fn truncated_before_headers_end() {
    let (bytes, _) = valid_archive(100);
    let truncated = bytes[..100].to_vec();
    assert!(matches!(
        ChmReader::open(truncated),
        Err(ChmError::HeaderTruncated { .. })
    ));
}

#[test]
fn corrupt_reset_table_fails_closed_by_default() {
    let (mut bytes, _) = valid_archive(100);
    // Section 0 starts after the directory: LZXC copy (40 bytes), then the
    // reset table record, whose version field we smash.
    let reset_table_offset = 220 + directory_length(&bytes) + 40;
    bytes[reset_table_offset] = 0xEE;
    assert!(matches!(
        ChmReader::open(bytes),
        Err(ChmError::ResetTableCorrupt { .. })
    ));
}

#[test]
fn corrupt_reset_table_tolerated_with_linear_fallback() {
    // Multi-interval payload so the fallback actually walks interval
    // boundaries while scanning from the section start.
    let (mut bytes, data) = valid_archive(2 * 0x8000 + 4321);
    let reset_table_offset = 220 + directory_length(&bytes) + 40;
    bytes[reset_table_offset] = 0xEE;

    let options = OpenOptions {
        tolerate_missing_reset_table: true,
        ..OpenOptions::default()
    };
    let mut chm = ChmReader::open_with(bytes, &options).unwrap();
    assert!(chm.reset_table().is_none());
    assert_eq!(chm.extract("/payload.bin").unwrap(), data);
}

#[test]
fn corrupt_block_type_in_content() {
    let (mut bytes, _) = valid_archive(3000);
    let dir_len = directory_length(&bytes);
    // Section 0 layout: LZXC copy (40), reset table (40 + 2 rows * 16),
    // then the LZX stream; one interval means two table rows.
    let content_offset = 220 + dir_len + 40 + (40 + 2 * 16);
    bytes[content_offset] = 0x00; // first 3 bits become block type 0

    let mut chm = ChmReader::open(bytes).unwrap();
    match chm.extract("/payload.bin") {
        Err(ChmError::Extract { name, source, .. }) => {
            assert_eq!(name, "/payload.bin");
            assert!(matches!(
                *source,
                ChmError::UnknownBlockType { block_type: 0 }
            ));
        }
        other => panic!("expected wrapped decode error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn strict_mode_accepts_sorted_archives() {
    let (bytes, data) = valid_archive(500);
    let options = OpenOptions {
        strict: true,
        ..OpenOptions::default()
    };
    let mut chm = ChmReader::open_with(bytes, &options).unwrap();
    assert_eq!(chm.extract("/payload.bin").unwrap(), data);
}

#[test]
fn malformed_archive_does_not_poison_retries() {
    let (good, data) = valid_archive(256);
    let mut bad = good.clone();
    bad[0] = 0;

    assert!(ChmReader::open(bad).is_err());
    // The failed open has no effect on a subsequent good one.
    let mut chm = ChmReader::open(good).unwrap();
    assert_eq!(chm.extract("/payload.bin").unwrap(), data);
}

#[test]
fn garbage_input_never_panics() {
    for seed in 0..16u32 {
        let junk = pseudo_random(seed, 400);
        let _ = ChmReader::open(junk);
    }
    let _ = ChmReader::open(Vec::new());
    let _ = ChmReader::open(b"ITSF".to_vec());
}
