//! Multi-block meta-text: up to 52 ASCII characters carried as up to 4
//! blocks of 13 bytes inside an LSF's `meta` field, reassembled by the
//! receiver from whichever blocks arrive (in any order).

use crate::{Error, Result};

/// Number of 13-byte text blocks a block-index nibble can address.
pub const MAX_BLOCKS: usize = 4;

/// ASCII payload length of one block.
pub const BLOCK_TEXT_LEN: usize = 13;

/// Wire size of one meta-text block: header byte + 13 text bytes.
pub const BLOCK_LEN: usize = BLOCK_TEXT_LEN + 1;

fn decode_header(header: u8) -> Option<(usize, usize)> {
    let total_mask = (header >> 4) & 0xF;
    let index_mask = header & 0xF;
    let total = match total_mask {
        0x1 => 1,
        0x3 => 2,
        0x7 => 3,
        0xF => 4,
        _ => return None,
    };
    let index = match index_mask {
        0x1 => 0,
        0x2 => 1,
        0x4 => 2,
        0x8 => 3,
        _ => return None,
    };
    if index >= total {
        return None;
    }
    Some((total, index))
}

fn encode_header(total: usize, index: usize) -> u8 {
    debug_assert!((1..=MAX_BLOCKS).contains(&total));
    debug_assert!(index < total);
    let total_mask: u8 = match total {
        1 => 0x1,
        2 => 0x3,
        3 => 0x7,
        _ => 0xF,
    };
    let index_mask: u8 = 1 << index;
    (total_mask << 4) | index_mask
}

/// Assembles (RX) or fragments (TX) up to 52 characters of meta-text
/// across up to 4 LSF meta blocks.
#[derive(Debug, Clone, Default)]
pub struct MetaText {
    blocks: [Option<[u8; BLOCK_TEXT_LEN]>; MAX_BLOCKS],
    total_blocks: Option<usize>,
    next_block: usize,
}

impl MetaText {
    /// New, empty meta-text assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored blocks and the output buffer.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Parse and store one received 14-byte block (header + 13 text
    /// bytes). Returns an error iff the header's total/index masks don't
    /// decode to a valid `(total, index)` pair.
    pub fn add_block(&mut self, block: &[u8; BLOCK_LEN]) -> Result<()> {
        let (total, index) = decode_header(block[0])
            .ok_or(Error::MetaTextBlockOutOfRange(block[0] as usize))?;
        let mut text = [0u8; BLOCK_TEXT_LEN];
        text.copy_from_slice(&block[1..]);
        self.blocks[index] = Some(text);
        self.total_blocks = Some(total);
        Ok(())
    }

    /// Concatenate the stored blocks, in index order, up to the
    /// advertised total, stopping at the first missing block. Trailing
    /// spaces are trimmed from the result. Returns `None` until at least
    /// one block (which carries the total-block count) has arrived.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        let total = self.total_blocks?;
        let mut buf = Vec::with_capacity(total * BLOCK_TEXT_LEN);
        for slot in &self.blocks[..total] {
            match slot {
                Some(text) => buf.extend_from_slice(text),
                None => break,
            }
        }
        let text = String::from_utf8_lossy(&buf);
        Some(text.trim_end_matches(' ').to_string())
    }

    /// Stage a text for transmission: split into up to 4 blocks of 13
    /// bytes each, space-padding the last block. Resets the round-robin
    /// cursor used by [`MetaText::next_block`].
    ///
    /// # Panics
    /// Panics if `text` is longer than `4 * BLOCK_TEXT_LEN` (52) bytes.
    pub fn set_text(&mut self, text: &str) {
        assert!(
            text.len() <= MAX_BLOCKS * BLOCK_TEXT_LEN,
            "meta-text longer than {} bytes",
            MAX_BLOCKS * BLOCK_TEXT_LEN
        );
        self.blocks = [None; MAX_BLOCKS];
        let bytes = text.as_bytes();
        let total = bytes.len().div_ceil(BLOCK_TEXT_LEN).max(1);
        for (i, chunk) in bytes.chunks(BLOCK_TEXT_LEN).enumerate() {
            let mut block = [b' '; BLOCK_TEXT_LEN];
            block[..chunk.len()].copy_from_slice(chunk);
            self.blocks[i] = Some(block);
        }
        self.total_blocks = Some(total);
        self.next_block = 0;
    }

    /// Retrieve the wire-format 14-byte encoding of block `index`, or
    /// `None` if that block hasn't been staged.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<[u8; BLOCK_LEN]> {
        let total = self.total_blocks?;
        if index >= total {
            return None;
        }
        let text = self.blocks[index]?;
        let mut out = [0u8; BLOCK_LEN];
        out[0] = encode_header(total, index);
        out[1..].copy_from_slice(&text);
        Some(out)
    }

    /// Advance and return the next block in round-robin order, cycling
    /// through `total_blocks` indefinitely. Returns `None` if no text has
    /// been staged.
    pub fn next_block(&mut self) -> Option<[u8; BLOCK_LEN]> {
        let total = self.total_blocks?;
        let out = self.block(self.next_block);
        self.next_block = (self.next_block + 1) % total;
        out
    }
}
