//! On-disk checkpoint record.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::blocks::BlockBitmap;

pub const CHECKPOINT_VERSION: u32 = 1;

/// Snapshot of every mission field except listeners and run-time flags
/// (`running`, `recovered`), which are re-derived on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub version: u32,
    pub name: String,
    pub url: String,
    pub location: PathBuf,
    pub length: u64,
    pub done: u64,
    pub block_size: u64,
    pub block_count: u64,
    pub blocks: BlockBitmap,
    pub worker_count: usize,
    pub worker_positions: Vec<u64>,
    pub finished_workers: usize,
    pub finished: bool,
    pub fallback: bool,
    pub probed: bool,
    pub length_known: bool,
    pub error_code: i32,
    pub timestamp: u64,
}
