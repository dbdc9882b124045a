//! LZX decompression.
//!
//! The decoder consumes one reset interval of compressed bytes at a time.
//! Within an interval the stream is a sequence of blocks; Huffman trees and
//! the three LRU match distances carry over from block to block, and the
//! sliding window carries the full interval history. All of that state is
//! discarded at interval boundaries, which is what makes the reset table's
//! random access possible: any interval decodes from its own compressed span
//! alone.
//!
//! CHM content sections never enable LZX's x86 E8 call translation, so no
//! post-processing filter is applied here.

use crate::huffman::HuffmanTable;
use crate::tables::{
    position_slots, ALIGNED_LEN_BITS, ALIGNED_SYMBOLS, FOOTER_BITS, LENGTH_SYMBOLS,
    main_tree_symbols, NUM_CHARS, POSITION_BASE, PRETREE_LEN_BITS, PRETREE_SYMBOLS,
};
use oxichm_core::bitstream::BitReader;
use oxichm_core::error::{ChmError, Result};
use oxichm_core::traits::CancelToken;
use oxichm_core::window::SlidingWindow;

/// Block type tag: verbatim.
pub(crate) const BLOCK_VERBATIM: u32 = 1;
/// Block type tag: aligned offset.
pub(crate) const BLOCK_ALIGNED: u32 = 2;
/// Block type tag: uncompressed.
pub(crate) const BLOCK_UNCOMPRESSED: u32 = 3;

/// Fewest bits a block can occupy (3-bit type + 24-bit size); trailing
/// padding below this is ignored when scanning without a length budget.
const MIN_BLOCK_BITS: u64 = 27;

/// An LZX decoder for one compressed content section.
///
/// Created on the first extraction request and reused across requests; each
/// call to [`LzxDecoder::decode_interval`] starts from a clean state, so two
/// requests for the same interval always produce identical bytes.
#[derive(Debug)]
pub struct LzxDecoder {
    window: SlidingWindow,
    reset_interval: u32,
    num_slots: usize,
    main_tree: Option<HuffmanTable>,
    length_tree: Option<HuffmanTable>,
    lru: [u32; 3],
}

impl LzxDecoder {
    /// Create a decoder for the given window size and reset interval.
    ///
    /// `window_size` must be one of the seven sizes LZX defines;
    /// `reset_interval` must be a positive multiple of 0x8000 small enough
    /// for a block header's 24-bit size field.
    pub fn new(window_size: u32, reset_interval: u32) -> Result<Self> {
        let num_slots =
            position_slots(window_size).ok_or(ChmError::WindowTooSmall { size: window_size })?;
        validate_reset_interval(reset_interval)?;

        Ok(Self {
            window: SlidingWindow::new(window_size as usize),
            reset_interval,
            num_slots,
            main_tree: None,
            length_tree: None,
            lru: [1, 1, 1],
        })
    }

    /// The reset interval this decoder was seeded with.
    pub fn reset_interval(&self) -> u32 {
        self.reset_interval
    }

    fn reset_state(&mut self) {
        self.window.reset();
        self.main_tree = None;
        self.length_tree = None;
        self.lru = [1, 1, 1];
    }

    /// Decode one reset interval from `compressed`.
    ///
    /// Produces at most `budget` bytes (the interval's uncompressed length,
    /// or the interval size when scanning without a reset table) and stops
    /// early only when nothing but byte padding remains in `compressed`.
    /// Returns the output and the number of compressed bytes consumed up to
    /// the next byte boundary.
    ///
    /// The cancel token, if any, is polled between blocks.
    pub fn decode_interval(
        &mut self,
        compressed: &[u8],
        budget: usize,
        cancel: Option<&CancelToken>,
    ) -> Result<(Vec<u8>, usize)> {
        self.reset_state();

        let mut reader = BitReader::new(compressed);
        let mut output = Vec::with_capacity(budget.min(self.reset_interval as usize));

        while output.len() < budget {
            if let Some(token) = cancel {
                token.check()?;
            }
            if reader.remaining_bits() < MIN_BLOCK_BITS {
                break;
            }
            self.decode_block(&mut reader, &mut output, budget)?;
        }

        reader.align_to_byte();
        Ok((output, reader.byte_pos()))
    }

    fn decode_block(
        &mut self,
        reader: &mut BitReader<'_>,
        output: &mut Vec<u8>,
        budget: usize,
    ) -> Result<()> {
        let block_type = reader.read_bits(3).map_err(truncated)?;
        // 24-bit uncompressed size, split 16 high + 8 low.
        let size_hi = reader.read_bits(16).map_err(truncated)?;
        let size_lo = reader.read_bits(8).map_err(truncated)?;
        let block_size = ((size_hi << 8) | size_lo) as usize;

        if block_size == 0 {
            return Err(ChmError::TruncatedBlock);
        }
        let remaining = budget - output.len();
        if block_size > remaining {
            return Err(ChmError::OutputOverflow {
                declared: block_size as u64,
                remaining: remaining as u64,
            });
        }

        match block_type {
            BLOCK_VERBATIM => {
                self.read_trees(reader)?;
                self.decode_symbols(reader, output, block_size, None)
            }
            BLOCK_ALIGNED => {
                let mut lengths = [0u8; ALIGNED_SYMBOLS];
                for len in &mut lengths {
                    *len = reader.read_bits(ALIGNED_LEN_BITS).map_err(truncated)? as u8;
                }
                let aligned = HuffmanTable::from_lengths(&lengths)?;
                self.read_trees(reader)?;
                self.decode_symbols(reader, output, block_size, Some(&aligned))
            }
            BLOCK_UNCOMPRESSED => self.copy_uncompressed(reader, output, block_size),
            other => Err(ChmError::UnknownBlockType {
                block_type: other as u8,
            }),
        }
    }

    /// Read the main and length trees, keeping the previous tree wherever a
    /// length vector decodes to all zeros.
    fn read_trees(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        let main_lengths = read_tree_lengths(reader, main_tree_symbols(self.num_slots))?;
        if main_lengths.iter().any(|&len| len > 0) {
            self.main_tree = Some(HuffmanTable::from_lengths(&main_lengths)?);
        }

        let length_lengths = read_tree_lengths(reader, LENGTH_SYMBOLS)?;
        if length_lengths.iter().any(|&len| len > 0) {
            self.length_tree = Some(HuffmanTable::from_lengths(&length_lengths)?);
        }

        Ok(())
    }

    fn decode_symbols(
        &mut self,
        reader: &mut BitReader<'_>,
        output: &mut Vec<u8>,
        block_size: usize,
        aligned: Option<&HuffmanTable>,
    ) -> Result<()> {
        let target = output.len() + block_size;
        let main = self.main_tree.as_ref().ok_or(ChmError::InvalidHuffman)?;

        while output.len() < target {
            let symbol = main.decode(reader).map_err(truncated)? as usize;

            if symbol < NUM_CHARS {
                let byte = symbol as u8;
                self.window.write_byte(byte);
                output.push(byte);
                continue;
            }

            let index = symbol - NUM_CHARS;
            let length_header = index & 7;
            let slot = index >> 3;

            let mut length = length_header + 2;
            if length_header == 7 {
                let tree = self.length_tree.as_ref().ok_or(ChmError::InvalidHuffman)?;
                length += tree.decode(reader).map_err(truncated)? as usize;
            }

            let distance = match slot {
                0 => self.lru[0],
                1 => {
                    self.lru.swap(0, 1);
                    self.lru[0]
                }
                2 => {
                    self.lru.swap(0, 2);
                    self.lru[0]
                }
                _ => {
                    let footer = FOOTER_BITS[slot];
                    let formatted = match aligned {
                        Some(tree) if footer >= 3 => {
                            let high = if footer > 3 {
                                reader.read_bits(footer - 3).map_err(truncated)?
                            } else {
                                0
                            };
                            let low = tree.decode(reader).map_err(truncated)? as u32;
                            POSITION_BASE[slot] + (high << 3) + low
                        }
                        _ if footer > 0 => {
                            POSITION_BASE[slot] + reader.read_bits(footer).map_err(truncated)?
                        }
                        _ => POSITION_BASE[slot],
                    };
                    let distance = formatted - 2;
                    self.lru[2] = self.lru[1];
                    self.lru[1] = self.lru[0];
                    self.lru[0] = distance;
                    distance
                }
            };

            if output.len() + length > target {
                return Err(ChmError::OutputOverflow {
                    declared: length as u64,
                    remaining: (target - output.len()) as u64,
                });
            }
            self.window.copy_match(distance as usize, length, output)?;
        }

        Ok(())
    }

    fn copy_uncompressed(
        &mut self,
        reader: &mut BitReader<'_>,
        output: &mut Vec<u8>,
        block_size: usize,
    ) -> Result<()> {
        reader.align_to_byte();
        for slot in &mut self.lru {
            *slot = reader.read_u32_le().map_err(truncated)?;
        }

        let bytes = reader.read_slice(block_size).map_err(truncated)?;
        for &byte in bytes {
            self.window.write_byte(byte);
        }
        output.extend_from_slice(bytes);
        Ok(())
    }
}

/// Running out of input mid-block is a truncated block.
fn truncated(err: ChmError) -> ChmError {
    match err {
        ChmError::EndOfStream { .. } => ChmError::TruncatedBlock,
        other => other,
    }
}

/// Validate an LZXC reset interval.
pub fn validate_reset_interval(reset_interval: u32) -> Result<()> {
    if reset_interval == 0 || reset_interval % 0x8000 != 0 || reset_interval >= 1 << 24 {
        return Err(ChmError::invalid_field(
            "reset_interval",
            reset_interval as u64,
        ));
    }
    Ok(())
}

/// Read a pre-tree and then a delta-coded code-length vector of `count`
/// entries.
///
/// Pre-tree symbols 0-15 are literal lengths; 16 repeats the previous length
/// (2 extra bits, run 3-6); 17, 18 and 19 emit zero runs (4 bits + 4,
/// 5 bits + 20 and 1 bit + 2 respectively).
fn read_tree_lengths(reader: &mut BitReader<'_>, count: usize) -> Result<Vec<u8>> {
    let mut pretree_lengths = [0u8; PRETREE_SYMBOLS];
    for len in &mut pretree_lengths {
        *len = reader.read_bits(PRETREE_LEN_BITS).map_err(truncated)? as u8;
    }
    let pretree = HuffmanTable::from_lengths(&pretree_lengths)?;

    let mut lengths = vec![0u8; count];
    let mut i = 0;
    while i < count {
        let symbol = pretree.decode(reader).map_err(truncated)?;
        match symbol {
            0..=15 => {
                lengths[i] = symbol as u8;
                i += 1;
            }
            16 => {
                if i == 0 {
                    return Err(ChmError::InvalidHuffman);
                }
                let run = reader.read_bits(2).map_err(truncated)? as usize + 3;
                if i + run > count {
                    return Err(ChmError::InvalidHuffman);
                }
                let previous = lengths[i - 1];
                lengths[i..i + run].fill(previous);
                i += run;
            }
            17 | 18 | 19 => {
                let run = match symbol {
                    17 => reader.read_bits(4).map_err(truncated)? as usize + 4,
                    18 => reader.read_bits(5).map_err(truncated)? as usize + 20,
                    _ => reader.read_bits(1).map_err(truncated)? as usize + 2,
                };
                if i + run > count {
                    return Err(ChmError::InvalidHuffman);
                }
                i += run;
            }
            _ => return Err(ChmError::InvalidHuffman),
        }
    }

    Ok(lengths)
}
