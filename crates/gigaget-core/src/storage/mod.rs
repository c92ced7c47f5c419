//! Output file I/O.
//!
//! The mission's output file is opened read/write without truncation so that a
//! resumed mission keeps every block it already preserved. Workers share the
//! file through positional writes (pwrite); block byte ranges never overlap.

mod builder;
mod writer;

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

use anyhow::{Context, Result};
use std::path::Path;

/// Remove `path`, treating a missing file as success.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// Replace `path` with `bytes` via a sibling temp file and rename, so a
/// crash mid-write leaves either the old or the new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    std::fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to rename {} to {}", tmp.display(), path.display()))?;
    Ok(())
}
