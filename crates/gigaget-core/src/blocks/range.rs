//! Block ranges and round-robin striping.

/// Byte range `[start, end)` covered by one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl BlockRange {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Value for curl's `CURLOPT_RANGE`: `start-end` with an inclusive end, no `bytes=` prefix.
    pub fn curl_range(&self) -> String {
        format!("{}-{}", self.start, self.end.saturating_sub(1))
    }
}

/// Number of blocks needed for `length` bytes: `ceil(length / block_size)`.
pub fn block_count(length: u64, block_size: u64) -> u64 {
    if block_size == 0 {
        return 0;
    }
    length.div_ceil(block_size)
}

/// Byte range of block `index`; the last block is cut at `length`.
pub fn block_range(index: u64, block_size: u64, length: u64) -> BlockRange {
    let start = index.saturating_mul(block_size).min(length);
    let end = start.saturating_add(block_size).min(length);
    BlockRange { start, end }
}

/// Next block for a worker after `current`: striping by `worker_count`.
pub fn next_block(current: u64, worker_count: usize) -> u64 {
    current.saturating_add(worker_count as u64)
}
