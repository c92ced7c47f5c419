//! Segmented worker: fetches its striped share of blocks with Range requests.

use std::cell::Cell;
use std::thread::{self, JoinHandle};

use super::{new_easy, parse_status_line, TransferError, TransferOptions};
use crate::blocks::{block_range, BlockRange};
use crate::mission::Mission;
use crate::retry::run_with_retry;
use crate::storage::StorageWriter;

/// Spawn worker `worker` for the start generation `epoch` of `mission`.
pub(crate) fn spawn(mission: Mission, worker: usize, epoch: u64) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("gigaget-seg-{worker}"))
        .spawn(move || run(mission, worker, epoch))
}

fn run(mission: Mission, worker: usize, epoch: u64) {
    tracing::debug!(mission = %mission.name(), worker, "segmented worker started");
    let storage = match StorageWriter::open(&mission.output_path()) {
        Ok(s) => s,
        Err(e) => {
            fail(&mission, worker, epoch, TransferError::storage(e));
            return;
        }
    };
    let opts = mission.transfer_options();

    loop {
        if !mission.keep_going(epoch) {
            tracing::debug!(mission = %mission.name(), worker, "segmented worker stopped");
            return;
        }
        let block = mission.next_pending_block(worker);
        if block >= mission.block_count() {
            tracing::debug!(mission = %mission.name(), worker, "segmented worker exhausted its blocks");
            mission.worker_finished(epoch);
            return;
        }

        let range = block_range(block, mission.block_size(), mission.length());
        let mut received = 0u64;
        let fetched = run_with_retry(
            &opts.retry,
            || mission.keep_going(epoch),
            || fetch_block(&mission, epoch, &storage, &opts, range, &mut received),
        );
        if let Err(e) = fetched {
            fail(&mission, worker, epoch, e);
            return;
        }
        mission.complete_block(worker, block, epoch);
    }
}

fn fail(mission: &Mission, worker: usize, epoch: u64, e: TransferError) {
    tracing::warn!(mission = %mission.name(), worker, "segmented transfer failed: {}", e);
    if !mission.is_current(epoch) {
        return;
    }
    mission.notify_error(e.error_code());
    mission.pause();
}

/// Fetch what is still missing of `range`; `received` carries over between
/// retry attempts so bytes already written are neither re-requested nor
/// reported twice.
fn fetch_block(
    mission: &Mission,
    epoch: u64,
    storage: &StorageWriter,
    opts: &TransferOptions,
    range: BlockRange,
    received: &mut u64,
) -> Result<(), TransferError> {
    let pending = BlockRange {
        start: range.start + *received,
        end: range.end,
    };
    if pending.is_empty() {
        return Ok(());
    }

    let mut easy = new_easy(mission.url(), opts)?;
    easy.range(&pending.curl_range())?;

    let status: Cell<Option<u32>> = Cell::new(None);
    let mut written = 0u64;
    let mut storage_error: Option<std::io::Error> = None;
    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Some(code) = std::str::from_utf8(line).ok().and_then(parse_status_line) {
                status.set(Some(code));
            }
            true
        })?;
        transfer.write_function(|data| {
            // Anything but 206 is either an error page or the whole file;
            // neither belongs at this offset.
            if status.get() != Some(206) {
                return Ok(0);
            }
            let room = pending.len() - written;
            let take = (data.len() as u64).min(room) as usize;
            if take == 0 {
                return Ok(data.len());
            }
            match storage.write_at(pending.start + written, &data[..take]) {
                Ok(()) => {
                    written += take as u64;
                    mission.worker_progress(epoch, take as u64);
                    Ok(data.len())
                }
                Err(e) => {
                    if let TransferError::Storage(io) = TransferError::storage(e) {
                        storage_error = Some(io);
                    }
                    Ok(0)
                }
            }
        })?;
        transfer.perform()
    };
    *received += written;

    if let Err(e) = performed {
        if e.is_write_error() {
            if let Some(io) = storage_error {
                return Err(TransferError::Storage(io));
            }
            if let Some(code) = status.get().filter(|&c| c != 206) {
                return Err(TransferError::Http(code));
            }
        }
        return Err(TransferError::Curl(e));
    }

    let code = easy.response_code()?;
    if code != 206 {
        return Err(TransferError::Http(code));
    }
    if *received < range.len() {
        return Err(TransferError::PartialTransfer {
            expected: range.len(),
            received: *received,
        });
    }
    Ok(())
}
