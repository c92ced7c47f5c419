//! Opening and preallocating the output file.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

use super::writer::StorageWriter;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Opens the output file (creating it if needed, never truncating) and
/// optionally preallocates it before handing out a shareable [`StorageWriter`].
pub struct StorageWriterBuilder {
    file: File,
    path: PathBuf,
}

impl StorageWriterBuilder {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open output file: {}", path.display()))?;
        Ok(StorageWriterBuilder {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Grow the file to `size` bytes. Never shrinks. On Unix tries
    /// `posix_fallocate` first and falls back to `set_len`.
    pub fn preallocate(&mut self, size: u64) -> Result<()> {
        let current = self
            .file
            .metadata()
            .with_context(|| format!("stat {}", self.path.display()))?
            .len();
        if current >= size {
            return Ok(());
        }
        #[cfg(unix)]
        {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        self.file
            .set_len(size)
            .context("failed to preallocate file")?;
        Ok(())
    }

    /// Drop any existing content (fallback transfers always restart at byte 0).
    pub fn truncate(&mut self) -> Result<()> {
        self.file
            .set_len(0)
            .with_context(|| format!("failed to truncate {}", self.path.display()))?;
        Ok(())
    }

    pub fn build(self) -> StorageWriter {
        StorageWriter::from_file_and_path(self.file, self.path)
    }
}
