//! Mutable mission bookkeeping. Everything here runs under the mission lock.

use std::path::Path;

use super::error::{MissionError, NO_ERROR};
use crate::blocks::{self, BlockBitmap};
use crate::checkpoint::{CheckpointRecord, CHECKPOINT_VERSION};
use crate::listener::ListenerSet;
use crate::transfer::ProbeResult;

/// What `start` has to launch once the bookkeeping is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartPlan {
    /// Server capabilities unknown: probe first, then plan again.
    Probe,
    Segmented { workers: usize },
    Fallback,
}

pub(crate) struct MissionState {
    pub length: u64,
    /// False until a probe or response header told us the size.
    pub length_known: bool,
    pub done: u64,
    pub block_size: u64,
    pub block_count: u64,
    pub blocks: BlockBitmap,
    pub worker_count: usize,
    /// Next block for each worker.
    pub positions: Vec<u64>,
    pub finished_workers: usize,
    pub finished: bool,
    pub fallback: bool,
    pub probed: bool,
    pub recovered: bool,
    pub error_code: i32,
    pub timestamp: u64,
    /// Set by `delete`; suppresses any later checkpoint write.
    pub discarded: bool,
    pub listeners: ListenerSet,
}

impl MissionState {
    pub fn new(block_size: u64, worker_count: usize, timestamp: u64) -> Self {
        Self {
            length: 0,
            length_known: false,
            done: 0,
            block_size,
            block_count: 0,
            blocks: BlockBitmap::default(),
            worker_count,
            positions: Vec::with_capacity(worker_count),
            finished_workers: 0,
            finished: false,
            fallback: false,
            probed: false,
            recovered: false,
            error_code: NO_ERROR,
            timestamp,
            discarded: false,
            listeners: ListenerSet::default(),
        }
    }

    pub fn from_record(record: CheckpointRecord) -> Self {
        Self {
            length: record.length,
            length_known: record.length_known,
            done: record.done.min(record.length),
            block_size: record.block_size,
            block_count: record.block_count,
            blocks: record.blocks,
            worker_count: record.worker_count.max(1),
            positions: record.worker_positions,
            finished_workers: record.finished_workers,
            finished: record.finished,
            fallback: record.fallback,
            probed: record.probed,
            recovered: true,
            error_code: record.error_code,
            timestamp: record.timestamp,
            discarded: false,
            listeners: ListenerSet::default(),
        }
    }

    pub fn to_record(&self, name: &str, url: &str, location: &Path) -> CheckpointRecord {
        CheckpointRecord {
            version: CHECKPOINT_VERSION,
            name: name.to_string(),
            url: url.to_string(),
            location: location.to_path_buf(),
            length: self.length,
            done: self.done,
            block_size: self.block_size,
            block_count: self.block_count,
            blocks: self.blocks.clone(),
            worker_count: self.worker_count,
            worker_positions: self.positions.clone(),
            finished_workers: self.finished_workers,
            finished: self.finished,
            fallback: self.fallback,
            probed: self.probed,
            length_known: self.length_known,
            error_code: self.error_code,
            timestamp: self.timestamp,
        }
    }

    /// Fix the total size and derive the block layout from it.
    pub fn set_length(&mut self, length: u64) {
        self.length = length;
        self.length_known = true;
        self.block_count = blocks::block_count(length, self.block_size);
        self.blocks = BlockBitmap::new(self.block_count);
        self.done = self.done.min(length);
    }

    pub fn apply_probe(&mut self, probe: &ProbeResult) {
        self.probed = true;
        self.fallback = !probe.supports_ranges;
        match probe.length {
            Some(len) => self.set_length(len),
            None => {
                self.length = 0;
                self.length_known = false;
                self.block_count = 0;
                self.blocks.reset();
            }
        }
    }

    fn check_block(&self, index: u64) -> Result<(), MissionError> {
        if index >= self.block_count {
            return Err(MissionError::BlockOutOfRange {
                index,
                block_count: self.block_count,
            });
        }
        Ok(())
    }

    pub fn is_preserved(&self, index: u64) -> Result<bool, MissionError> {
        self.check_block(index)?;
        Ok(self.blocks.get(index))
    }

    pub fn preserve(&mut self, index: u64) -> Result<(), MissionError> {
        self.check_block(index)?;
        self.blocks.set(index);
        Ok(())
    }

    /// `done += delta`, clamped to `length`. Returns the new value.
    pub fn add_progress(&mut self, delta: u64) -> u64 {
        self.done = self.done.saturating_add(delta).min(self.length);
        self.done
    }

    /// Bytes covered by preserved blocks.
    pub fn preserved_bytes(&self) -> u64 {
        (0..self.block_count)
            .filter(|&b| self.blocks.get(b))
            .map(|b| blocks::block_range(b, self.block_size, self.length).len())
            .sum()
    }

    /// Reset the per-run bookkeeping for a (re)start and decide what to launch.
    pub fn prepare_start(&mut self) -> StartPlan {
        self.error_code = NO_ERROR;
        self.finished_workers = 0;
        if !self.probed {
            return StartPlan::Probe;
        }
        if self.fallback {
            // No resume in fallback mode.
            self.worker_count = 1;
            self.done = 0;
            self.block_count = 0;
            self.blocks.reset();
            self.positions.clear();
            return StartPlan::Fallback;
        }
        // Existing positions (from a checkpoint or an earlier run) are kept;
        // only missing ones get their initial stripe offset.
        for i in self.positions.len()..self.worker_count {
            self.positions.push(i as u64);
        }
        self.positions.truncate(self.worker_count);
        self.done = self.done.max(self.preserved_bytes());
        StartPlan::Segmented {
            workers: self.worker_count,
        }
    }

    /// Skip blocks that are already preserved, store the worker's new
    /// position, and return it (may be `>= block_count` when exhausted).
    pub fn next_pending(&mut self, worker: usize) -> u64 {
        let Some(&current) = self.positions.get(worker) else {
            return self.block_count;
        };
        let mut block = current;
        while block < self.block_count && self.blocks.get(block) {
            block = blocks::next_block(block, self.worker_count);
        }
        self.positions[worker] = block;
        block
    }

    /// Mark `block` preserved and advance `worker` to its next stripe.
    pub fn complete_block(&mut self, worker: usize, block: u64) {
        if block < self.block_count {
            self.blocks.set(block);
        }
        if let Some(pos) = self.positions.get_mut(worker) {
            *pos = blocks::next_block(block, self.worker_count);
        }
    }
}
