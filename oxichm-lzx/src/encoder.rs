//! LZX compression.
//!
//! A correctness-first encoder: every block is a verbatim block built from a
//! hash-chain LZ77 pass and canonical Huffman codes over the observed symbol
//! frequencies. One block is emitted per reset interval, the LZ77 state and
//! Huffman context are discarded at each interval boundary, and every
//! interval starts on a byte boundary, which is what the reset table records.
//!
//! The encoder tracks the same three-slot LRU distance set the decoder
//! maintains and emits the special position slots 0-2 whenever a match
//! distance repeats.

use crate::decoder::{validate_reset_interval, BLOCK_VERBATIM};
use crate::huffman::{canonical_codes, HuffmanBuilder};
use crate::lz77::{Lz77Token, MatchFinder};
use crate::tables::{
    main_tree_symbols, position_slots, slot_for_formatted, FOOTER_BITS, LENGTH_SYMBOLS,
    MAX_CODE_LENGTH, POSITION_BASE, PRETREE_LEN_BITS, PRETREE_SYMBOLS,
};
use oxichm_core::bitstream::BitWriter;
use oxichm_core::error::{ChmError, Result};

/// A compressed section plus the reset boundaries needed to index it.
#[derive(Debug)]
pub struct EncodedSection {
    /// The LZX byte stream.
    pub data: Vec<u8>,
    /// `(compressed_offset, uncompressed_offset)` of each reset interval,
    /// starting with `(0, 0)`; empty for empty input.
    pub boundaries: Vec<(u64, u64)>,
}

/// An LZX encoder seeded with a window size and reset interval.
#[derive(Debug)]
pub struct LzxEncoder {
    reset_interval: u32,
    num_slots: usize,
    finder: MatchFinder,
}

/// One symbol of a prepared block: the main-tree symbol plus whatever
/// trailing fields it drags along.
struct Emit {
    main: u16,
    length_sym: Option<u16>,
    footer_val: u32,
    footer_bits: u8,
}

impl LzxEncoder {
    /// Create an encoder.
    ///
    /// Accepts the same window sizes and reset intervals as the decoder.
    pub fn new(window_size: u32, reset_interval: u32) -> Result<Self> {
        let num_slots =
            position_slots(window_size).ok_or(ChmError::WindowTooSmall { size: window_size })?;
        validate_reset_interval(reset_interval)?;

        // Formatted offsets are distance + 2 and must stay below the window
        // size, so the largest encodable distance is three short of it.
        let max_distance = window_size as usize - 3;

        Ok(Self {
            reset_interval,
            num_slots,
            finder: MatchFinder::new(max_distance),
        })
    }

    /// Compress `input` into an LZX section with reset boundaries.
    pub fn encode_section(&self, input: &[u8]) -> Result<EncodedSection> {
        let mut data = Vec::new();
        let mut boundaries = Vec::new();

        for (index, chunk) in input.chunks(self.reset_interval as usize).enumerate() {
            boundaries.push((
                data.len() as u64,
                index as u64 * self.reset_interval as u64,
            ));
            let block = self.encode_interval(chunk)?;
            data.extend_from_slice(&block);
        }

        Ok(EncodedSection { data, boundaries })
    }

    /// Encode one reset interval as a single verbatim block.
    fn encode_interval(&self, chunk: &[u8]) -> Result<Vec<u8>> {
        let emits = self.prepare_symbols(chunk)?;

        let mut main_builder = HuffmanBuilder::new(main_tree_symbols(self.num_slots), MAX_CODE_LENGTH);
        let mut length_builder = HuffmanBuilder::new(LENGTH_SYMBOLS, MAX_CODE_LENGTH);
        for emit in &emits {
            main_builder.add(emit.main);
            if let Some(sym) = emit.length_sym {
                length_builder.add(sym);
            }
        }
        let main_lengths = main_builder.build_lengths();
        let length_lengths = length_builder.build_lengths();

        let mut writer = BitWriter::new();
        writer.write_bits(BLOCK_VERBATIM, 3);
        writer.write_bits((chunk.len() >> 8) as u32, 16);
        writer.write_bits((chunk.len() & 0xFF) as u32, 8);
        write_tree(&mut writer, &main_lengths);
        write_tree(&mut writer, &length_lengths);

        let main_codes = canonical_codes(&main_lengths);
        let length_codes = canonical_codes(&length_lengths);
        for emit in &emits {
            let (code, len) = main_codes[emit.main as usize];
            writer.write_bits(code, len);
            if let Some(sym) = emit.length_sym {
                let (code, len) = length_codes[sym as usize];
                writer.write_bits(code, len);
            }
            if emit.footer_bits > 0 {
                writer.write_bits(emit.footer_val, emit.footer_bits);
            }
        }

        Ok(writer.into_bytes())
    }

    /// Run match finding and map tokens to main-tree symbols, tracking the
    /// LRU distances exactly as the decoder will.
    fn prepare_symbols(&self, chunk: &[u8]) -> Result<Vec<Emit>> {
        let tokens = self.finder.tokenize(chunk);
        let mut lru = [1u32; 3];
        let mut emits = Vec::with_capacity(tokens.len());

        for token in tokens {
            match token {
                Lz77Token::Literal(byte) => emits.push(Emit {
                    main: byte as u16,
                    length_sym: None,
                    footer_val: 0,
                    footer_bits: 0,
                }),
                Lz77Token::Match { length, distance } => {
                    let (slot, footer_val, footer_bits) = if distance == lru[0] {
                        (0, 0, 0)
                    } else if distance == lru[1] {
                        lru.swap(0, 1);
                        (1, 0, 0)
                    } else if distance == lru[2] {
                        lru.swap(0, 2);
                        (2, 0, 0)
                    } else {
                        let formatted = distance + 2;
                        let slot =
                            slot_for_formatted(formatted, self.num_slots).ok_or_else(|| {
                                ChmError::encoder(format!(
                                    "match distance {} exceeds the window",
                                    distance
                                ))
                            })?;
                        lru[2] = lru[1];
                        lru[1] = lru[0];
                        lru[0] = distance;
                        (slot, formatted - POSITION_BASE[slot], FOOTER_BITS[slot])
                    };

                    let extent = (length - 2) as usize;
                    let (header, length_sym) = if extent < 7 {
                        (extent, None)
                    } else {
                        (7, Some((extent - 7) as u16))
                    };

                    emits.push(Emit {
                        main: (256 + (slot << 3) + header) as u16,
                        length_sym,
                        footer_val,
                        footer_bits,
                    });
                }
            }
        }

        Ok(emits)
    }
}

/// Serialize a code-length vector: a 20-symbol pre-tree stored as 4-bit raw
/// lengths, then the vector run-length coded through it.
///
/// Symbols 0-15 are literal lengths; 16 repeats the previous length (2 extra
/// bits, run 3-6); 17/18/19 emit zero runs of 4-19, 20-51 and 2-3.
pub(crate) fn write_tree(writer: &mut BitWriter, lengths: &[u8]) {
    let mut symbols: Vec<(u8, u32, u8)> = Vec::new();

    let mut i = 0;
    while i < lengths.len() {
        let value = lengths[i];
        let mut run = 1;
        while i + run < lengths.len() && lengths[i + run] == value {
            run += 1;
        }
        i += run;

        if value == 0 {
            let mut left = run;
            while left > 0 {
                if left >= 20 {
                    let take = left.min(51);
                    symbols.push((18, (take - 20) as u32, 5));
                    left -= take;
                } else if left >= 4 {
                    symbols.push((17, (left - 4) as u32, 4));
                    left = 0;
                } else if left >= 2 {
                    symbols.push((19, (left - 2) as u32, 1));
                    left = 0;
                } else {
                    symbols.push((0, 0, 0));
                    left = 0;
                }
            }
        } else {
            symbols.push((value, 0, 0));
            let mut left = run - 1;
            while left > 0 {
                if left >= 3 {
                    let take = left.min(6);
                    symbols.push((16, (take - 3) as u32, 2));
                    left -= take;
                } else {
                    symbols.push((value, 0, 0));
                    left -= 1;
                }
            }
        }
    }

    let mut pretree_builder = HuffmanBuilder::new(PRETREE_SYMBOLS, 15);
    for &(symbol, _, _) in &symbols {
        pretree_builder.add(symbol as u16);
    }
    let pretree_lengths = pretree_builder.build_lengths();
    for &len in &pretree_lengths {
        writer.write_bits(len as u32, PRETREE_LEN_BITS);
    }

    let pretree_codes = canonical_codes(&pretree_lengths);
    for &(symbol, extra, extra_bits) in &symbols {
        let (code, len) = pretree_codes[symbol as usize];
        writer.write_bits(code, len);
        if extra_bits > 0 {
            writer.write_bits(extra, extra_bits);
        }
    }
}
