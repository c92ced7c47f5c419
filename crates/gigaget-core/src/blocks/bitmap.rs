//! Preserved-block bitmap.

use serde::{Deserialize, Serialize};

/// One bit per block (LSB of byte 0 = block 0). Bits are only ever set, never
/// cleared, except by [`BlockBitmap::reset`] when a fallback restart discards
/// all block bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBitmap {
    bytes: Vec<u8>,
}

impl BlockBitmap {
    pub fn new(block_count: u64) -> Self {
        BlockBitmap {
            bytes: vec![0u8; Self::byte_len(block_count)],
        }
    }

    fn byte_len(block_count: u64) -> usize {
        block_count.div_ceil(8) as usize
    }

    pub fn set(&mut self, index: u64) {
        let byte_idx = (index / 8) as usize;
        if byte_idx >= self.bytes.len() {
            self.bytes.resize(byte_idx + 1, 0);
        }
        self.bytes[byte_idx] |= 1 << (index % 8);
    }

    pub fn get(&self, index: u64) -> bool {
        self.bytes
            .get((index / 8) as usize)
            .map(|&b| (b & (1 << (index % 8))) != 0)
            .unwrap_or(false)
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
    }
}
