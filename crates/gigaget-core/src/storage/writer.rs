//! Positional writer shared by the workers of one mission.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

use super::builder::StorageWriterBuilder;

/// Writer for a mission's output file. Cheap to clone; each `write_at` is
/// independent of any file cursor (pwrite-style).
#[derive(Clone)]
pub struct StorageWriter {
    file: Arc<File>,
    path: PathBuf,
}

impl StorageWriter {
    pub(crate) fn from_file_and_path(file: File, path: PathBuf) -> Self {
        Self {
            file: Arc::new(file),
            path,
        }
    }

    /// Open (or create) the output file without preallocation.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(StorageWriterBuilder::open(path)?.build())
    }

    /// Write all of `data` at `offset`.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.file
            .write_all_at(data, offset)
            .context("storage write_at failed")?;
        Ok(())
    }

    /// Non-Unix: seek + write on a cloned handle. Not safe for concurrent use.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = (*self.file).try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)?;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_data().context("storage sync failed")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
