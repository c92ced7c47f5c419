//! The download mission: identity, progress bookkeeping and lifecycle.
//!
//! A [`Mission`] is a cheap, cloneable handle. Workers, listeners and the
//! manager all hold clones of the same handle; the mutable state sits behind
//! one mutex per mission so notify operations, listener changes and
//! block-state access never interleave.

mod builder;
mod error;
mod notify;
mod state;

pub use builder::MissionBuilder;
pub use error::{MissionError, ERROR_SERVER_UNSUPPORTED, ERROR_UNKNOWN, NO_ERROR};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use anyhow::Context;

use self::state::{MissionState, StartPlan};
use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::listener::{DeliveryContext, ListenerGuard, ListenerId, MissionListener};
use crate::storage::{self, StorageWriterBuilder};
use crate::transfer::{self, fallback, segmented, TransferOptions};

/// Coarse lifecycle state, derived from the mission flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionStatus {
    /// Never started.
    Idle,
    Running,
    /// Stopped and resumable.
    Paused,
    Finished,
    Failed(i32),
}

#[derive(Clone)]
pub struct Mission {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    url: String,
    location: PathBuf,
    transfer: TransferOptions,
    checkpoint: CheckpointStore,
    running: AtomicBool,
    /// Bumped by every `start`; workers of an older generation stop.
    epoch: AtomicU64,
    writing_checkpoint: AtomicBool,
    state: Mutex<MissionState>,
}

impl Mission {
    fn from_parts(name: String, url: String, location: PathBuf, transfer: TransferOptions, state: MissionState) -> Self {
        let checkpoint = CheckpointStore::for_mission(&location, &name);
        Self {
            shared: Arc::new(Shared {
                name,
                url,
                location,
                transfer,
                checkpoint,
                running: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                writing_checkpoint: AtomicBool::new(false),
                state: Mutex::new(state),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MissionState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn location(&self) -> &Path {
        &self.shared.location
    }

    /// `<location>/<name>`.
    pub fn output_path(&self) -> PathBuf {
        self.shared.location.join(&self.shared.name)
    }

    pub fn checkpoint_path(&self) -> &Path {
        self.shared.checkpoint.path()
    }

    pub fn transfer_options(&self) -> TransferOptions {
        self.shared.transfer
    }

    pub fn length(&self) -> u64 {
        self.lock().length
    }

    pub fn done(&self) -> u64 {
        self.lock().done
    }

    pub fn block_size(&self) -> u64 {
        self.lock().block_size
    }

    pub fn block_count(&self) -> u64 {
        self.lock().block_count
    }

    pub fn worker_count(&self) -> usize {
        self.lock().worker_count
    }

    pub fn worker_positions(&self) -> Vec<u64> {
        self.lock().positions.clone()
    }

    pub fn finished_workers(&self) -> usize {
        self.lock().finished_workers
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    pub fn is_fallback(&self) -> bool {
        self.lock().fallback
    }

    pub fn is_recovered(&self) -> bool {
        self.lock().recovered
    }

    pub fn error_code(&self) -> i32 {
        self.lock().error_code
    }

    /// Creation time in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.lock().timestamp
    }

    pub fn status(&self) -> MissionStatus {
        let st = self.lock();
        if st.finished {
            MissionStatus::Finished
        } else if st.error_code > 0 {
            MissionStatus::Failed(st.error_code)
        } else if self.is_running() {
            MissionStatus::Running
        } else if st.recovered || st.done > 0 {
            MissionStatus::Paused
        } else {
            MissionStatus::Idle
        }
    }

    /// Snapshot of the persisted fields.
    pub fn record(&self) -> CheckpointRecord {
        self.lock().to_record(self.name(), self.url(), self.location())
    }

    pub fn is_block_preserved(&self, block: u64) -> Result<bool, MissionError> {
        self.lock().is_preserved(block)
    }

    pub fn preserve_block(&self, block: u64) -> Result<(), MissionError> {
        self.lock().preserve(block)
    }

    /// Start (or resume) the transfer. No-op when running or finished.
    /// Never blocks: probing and transfers happen on worker threads.
    pub fn start(&self) {
        let (plan, epoch) = {
            let mut st = self.lock();
            if self.is_running() || st.finished {
                return;
            }
            let epoch = self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1;
            self.shared.running.store(true, Ordering::Release);
            (st.prepare_start(), epoch)
        };
        tracing::info!(mission = %self.name(), ?plan, epoch, "mission started");
        self.launch(plan, epoch);
    }

    /// Stop cooperatively. Workers notice at their next check.
    pub fn pause(&self) {
        let mut st = self.lock();
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        st.recovered = true;
        tracing::info!(mission = %self.name(), done = st.done, length = st.length, "mission paused");
    }

    /// Remove the checkpoint and the output file. Running workers are not
    /// stopped; pause first.
    pub fn delete(&self) -> anyhow::Result<()> {
        let mut st = self.lock();
        st.discarded = true;
        let checkpoint = self.shared.checkpoint.remove();
        let output = storage::remove_if_exists(&self.output_path());
        drop(st);
        tracing::info!(mission = %self.name(), "mission deleted");
        checkpoint.context("remove checkpoint")?;
        output.context("remove output file")?;
        Ok(())
    }

    pub fn add_listener(&self, listener: Arc<dyn MissionListener>, context: Arc<dyn DeliveryContext>) -> ListenerId {
        self.lock().listeners.add(listener, context)
    }

    /// Like [`add_listener`](Self::add_listener) but deregisters when the guard drops.
    pub fn subscribe(&self, listener: Arc<dyn MissionListener>, context: Arc<dyn DeliveryContext>) -> ListenerGuard {
        let id = self.add_listener(listener, context);
        ListenerGuard::new(self.clone(), id)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.lock().listeners.remove(id)
    }

    /// Remove every registration of `listener`. Returns how many were removed.
    pub fn remove_listener_instance(&self, listener: &Arc<dyn MissionListener>) -> usize {
        self.lock().listeners.remove_listener(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// No `start` happened since the one that created `epoch`.
    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.shared.epoch.load(Ordering::Acquire) == epoch
    }

    /// Workers of `epoch` may continue.
    pub(crate) fn keep_going(&self, epoch: u64) -> bool {
        self.is_running() && self.is_current(epoch)
    }

    pub(crate) fn next_pending_block(&self, worker: usize) -> u64 {
        self.lock().next_pending(worker)
    }

    /// A worker of `epoch` wrote all of `block`. The block is kept either
    /// way; only a current worker moves its position.
    pub(crate) fn complete_block(&self, worker: usize, block: u64, epoch: u64) {
        let mut st = self.lock();
        if self.is_current(epoch) {
            st.complete_block(worker, block);
        } else if block < st.block_count {
            st.blocks.set(block);
        }
    }

    /// Length announced by a fallback response.
    pub(crate) fn expect_length(&self, length: u64) {
        let mut st = self.lock();
        st.length = length;
        st.length_known = true;
    }

    /// Fallback streams past an unknown or understated length.
    pub(crate) fn grow_length(&self, at_least: u64) {
        let mut st = self.lock();
        if st.length < at_least {
            st.length = at_least;
        }
    }

    fn launch(&self, plan: StartPlan, epoch: u64) {
        match plan {
            StartPlan::Probe => {
                let mission = self.clone();
                let spawned = thread::Builder::new()
                    .name("gigaget-probe".to_string())
                    .spawn(move || mission.run_probe(epoch));
                if let Err(e) = spawned {
                    self.abort(ERROR_UNKNOWN, &e);
                }
            }
            StartPlan::Segmented { workers } => {
                if let Err(e) = self.prepare_output(true) {
                    self.abort(ERROR_UNKNOWN, &e);
                    return;
                }
                for worker in 0..workers {
                    if let Err(e) = segmented::spawn(self.clone(), worker, epoch) {
                        self.abort(ERROR_UNKNOWN, &e);
                        return;
                    }
                }
            }
            StartPlan::Fallback => {
                if let Err(e) = self.prepare_output(false) {
                    self.abort(ERROR_UNKNOWN, &e);
                    return;
                }
                if let Err(e) = fallback::spawn(self.clone(), epoch) {
                    self.abort(ERROR_UNKNOWN, &e);
                }
            }
        }
    }

    fn run_probe(&self, epoch: u64) {
        let result = match transfer::probe(self.url(), &self.shared.transfer) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(mission = %self.name(), "probe failed: {}", e);
                if !self.is_current(epoch) {
                    return;
                }
                self.notify_error(e.error_code());
                self.pause();
                return;
            }
        };
        let plan = {
            let mut st = self.lock();
            if !self.keep_going(epoch) {
                return;
            }
            st.apply_probe(&result);
            st.prepare_start()
        };
        self.launch(plan, epoch);
    }

    /// Create the location and, in segmented mode, size the output file.
    fn prepare_output(&self, preallocate: bool) -> anyhow::Result<()> {
        std::fs::create_dir_all(self.location())
            .with_context(|| format!("create download dir: {}", self.location().display()))?;
        if preallocate {
            let length = self.length();
            StorageWriterBuilder::open(&self.output_path())?.preallocate(length)?;
        }
        Ok(())
    }

    fn abort(&self, code: i32, reason: &dyn fmt::Display) {
        tracing::warn!(mission = %self.name(), "could not launch transfer: {}", reason);
        self.notify_error(code);
        self.pause();
    }
}

impl PartialEq for Mission {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Mission {}

impl fmt::Debug for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.lock();
        f.debug_struct("Mission")
            .field("name", &self.shared.name)
            .field("url", &self.shared.url)
            .field("location", &self.shared.location)
            .field("done", &st.done)
            .field("length", &st.length)
            .field("running", &self.is_running())
            .field("finished", &st.finished)
            .field("error_code", &st.error_code)
            .finish()
    }
}
