//! Block math and the preserved-block bitmap.
//!
//! A file of `length` bytes is cut into fixed-size blocks; worker `i` of `n`
//! owns blocks `i, i+n, i+2n, …`. The bitmap records which blocks are already
//! on disk so a resumed mission never fetches them again.

mod bitmap;
mod range;

pub use bitmap::BlockBitmap;
pub use range::{block_count, block_range, next_block, BlockRange};
