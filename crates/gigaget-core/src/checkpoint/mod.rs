//! Durable mission checkpoints (`<location>/<name>.giga`, JSON).
//!
//! The store is plain I/O. The at-most-one-write-in-flight policy and the
//! decision of when to write live in the mission.

mod record;

pub use record::{CheckpointRecord, CHECKPOINT_VERSION};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::storage;

/// File extension of checkpoint records.
pub const CHECKPOINT_EXTENSION: &str = "giga";

/// Location of one mission's checkpoint record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Store for the mission identified by `(location, name)`.
    pub fn for_mission(location: &Path, name: &str) -> Self {
        Self {
            path: location.join(format!("{name}.{CHECKPOINT_EXTENSION}")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the record; `Ok(None)` when there is none.
    pub fn load(&self) -> Result<Option<CheckpointRecord>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read checkpoint: {}", self.path.display())),
        };
        let record: CheckpointRecord = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse checkpoint: {}", self.path.display()))?;
        Ok(Some(record))
    }

    pub fn save(&self, record: &CheckpointRecord) -> Result<()> {
        let json = serde_json::to_vec(record).context("serialize checkpoint")?;
        storage::write_atomic(&self.path, &json)
    }

    /// Delete the record. Returns whether one existed.
    pub fn remove(&self) -> Result<bool> {
        storage::remove_if_exists(&self.path)
    }
}
