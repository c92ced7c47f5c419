//! Single-stream fallback worker for servers that ignore Range requests.
//!
//! Streams the whole body from offset 0 in fixed-size chunks. There is no
//! resume: every start rewrites the file from the beginning.

use std::cell::Cell;
use std::thread::{self, JoinHandle};

use super::{new_easy, parse_status_line, TransferError};
use crate::mission::{Mission, NO_ERROR};
use crate::storage::StorageWriterBuilder;

/// How the stream ended when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    /// The mission was paused or restarted between two chunks.
    Stopped,
}

pub(crate) fn spawn(mission: Mission, epoch: u64) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("gigaget-fallback".to_string())
        .spawn(move || run(mission, epoch))
}

fn run(mission: Mission, epoch: u64) {
    tracing::debug!(mission = %mission.name(), "fallback worker started");
    match stream(&mission, epoch) {
        Ok(Outcome::Completed) => {
            if mission.error_code() == NO_ERROR && mission.keep_going(epoch) {
                mission.worker_finished(epoch);
            }
        }
        Ok(Outcome::Stopped) => {
            tracing::debug!(mission = %mission.name(), "fallback worker stopped");
        }
        Err(e) => {
            tracing::warn!(mission = %mission.name(), "fallback transfer failed: {}", e);
            if !mission.is_current(epoch) {
                return;
            }
            mission.notify_error(e.error_code());
            // Only worker of this mission: nobody else will stop it.
            mission.pause();
        }
    }
}

fn accepted(status: Option<u32>) -> bool {
    matches!(status, Some(200) | Some(206))
}

fn stream(mission: &Mission, epoch: u64) -> Result<Outcome, TransferError> {
    let mut builder = StorageWriterBuilder::open(&mission.output_path()).map_err(TransferError::storage)?;
    builder.truncate().map_err(TransferError::storage)?;
    let storage = builder.build();
    let opts = mission.transfer_options();
    let chunk_size = opts.fallback_chunk_bytes;

    let mut easy = new_easy(mission.url(), &opts)?;
    let status: Cell<Option<u32>> = Cell::new(None);
    let content_length: Cell<Option<u64>> = Cell::new(None);
    let mut offset = 0u64;
    let mut stopped = false;
    let mut storage_error: Option<TransferError> = None;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(line) = std::str::from_utf8(data) {
                if let Some(code) = parse_status_line(line) {
                    status.set(Some(code));
                    content_length.set(None);
                } else if let Some((name, value)) = line.split_once(':') {
                    if name.trim().eq_ignore_ascii_case("content-length") {
                        content_length.set(value.trim().parse().ok());
                    }
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            if !accepted(status.get()) {
                return Ok(0);
            }
            if offset == 0 {
                if let Some(n) = content_length.get() {
                    mission.expect_length(n);
                }
            }
            for chunk in data.chunks(chunk_size) {
                if let Err(e) = storage.write_at(offset, chunk) {
                    storage_error = Some(TransferError::storage(e));
                    return Ok(0);
                }
                offset += chunk.len() as u64;
                mission.grow_length(offset);
                mission.worker_progress(epoch, chunk.len() as u64);
                if !mission.keep_going(epoch) {
                    stopped = true;
                    return Ok(0);
                }
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if e.is_write_error() {
            if let Some(err) = storage_error {
                return Err(err);
            }
            if stopped {
                return Ok(Outcome::Stopped);
            }
            if let Some(code) = status.get().filter(|_| !accepted(status.get())) {
                return Err(TransferError::Http(code));
            }
        }
        return Err(TransferError::Curl(e));
    }

    let code = easy.response_code()?;
    if !accepted(Some(code)) {
        return Err(TransferError::Http(code));
    }
    if let Some(expected) = content_length.get() {
        if offset < expected {
            return Err(TransferError::PartialTransfer {
                expected,
                received: offset,
            });
        }
    }
    storage.sync().map_err(TransferError::storage)?;
    Ok(Outcome::Completed)
}
