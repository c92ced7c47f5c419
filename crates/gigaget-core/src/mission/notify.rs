//! Worker callbacks: progress, completion, failure, and the checkpoint writes
//! they trigger.

use std::sync::atomic::Ordering;
use std::thread;

use super::state::MissionState;
use super::Mission;
use crate::listener::MissionEvent;

impl Mission {
    /// Account `delta` freshly written bytes. No-op when not running or
    /// after an error.
    pub fn notify_progress(&self, delta: u64) {
        let mut st = self.lock();
        self.progress_locked(&mut st, delta);
    }

    /// [`notify_progress`](Self::notify_progress) from a worker of start
    /// generation `epoch`; bytes of a superseded worker are not counted.
    pub(crate) fn worker_progress(&self, epoch: u64, delta: u64) {
        let mut st = self.lock();
        if self.shared.epoch.load(Ordering::Acquire) == epoch {
            self.progress_locked(&mut st, delta);
        }
    }

    fn progress_locked(&self, st: &mut MissionState, delta: u64) {
        if !self.is_running() || st.error_code > 0 {
            return;
        }
        st.recovered = false;
        let done = st.add_progress(delta);
        if done < st.length {
            self.request_checkpoint();
        }
        st.listeners.deliver(
            self,
            MissionEvent::Progress {
                done,
                total: st.length,
            },
        );
    }

    /// One worker exhausted its assignment. The last one finishes the mission.
    pub fn notify_finished(&self) {
        let mut st = self.lock();
        self.finish_locked(&mut st);
    }

    /// [`notify_finished`](Self::notify_finished) for a worker of start
    /// generation `epoch`; ignored once a newer `start` took over.
    pub(crate) fn worker_finished(&self, epoch: u64) {
        let mut st = self.lock();
        if self.shared.epoch.load(Ordering::Acquire) != epoch {
            tracing::debug!(mission = %self.name(), epoch, "completion from superseded worker ignored");
            return;
        }
        self.finish_locked(&mut st);
    }

    fn finish_locked(&self, st: &mut MissionState) {
        if st.error_code > 0 || st.finished {
            return;
        }
        st.finished_workers += 1;
        if st.finished_workers < st.worker_count {
            tracing::debug!(
                mission = %self.name(),
                finished = st.finished_workers,
                workers = st.worker_count,
                "worker finished"
            );
            return;
        }
        self.shared.running.store(false, Ordering::Release);
        st.finished = true;
        if !st.length_known {
            st.length = st.done;
            st.length_known = true;
        }
        if let Err(e) = self.shared.checkpoint.remove() {
            tracing::warn!(mission = %self.name(), "failed to remove checkpoint: {:#}", e);
        }
        tracing::info!(mission = %self.name(), length = st.length, "mission finished");
        st.listeners.deliver(self, MissionEvent::Finished);
    }

    /// Record a terminal error. The first code wins; the failure point is
    /// checkpointed before listeners hear about it.
    pub fn notify_error(&self, code: i32) {
        let mut st = self.lock();
        if code <= 0 {
            tracing::warn!(mission = %self.name(), code, "ignoring non-positive error code");
            return;
        }
        if st.error_code > 0 || st.finished {
            return;
        }
        st.error_code = code;
        tracing::warn!(mission = %self.name(), code, done = st.done, "mission failed");
        self.write_checkpoint_locked(&st);
        st.listeners.deliver(self, MissionEvent::Error(code));
    }

    /// Write the checkpoint now, on the calling thread. Used before a
    /// process exits with the mission paused.
    pub fn save_checkpoint(&self) {
        let st = self.lock();
        self.write_checkpoint_locked(&st);
    }

    /// Fire-and-forget checkpoint write. Dropped when one is already in flight.
    fn request_checkpoint(&self) {
        if self
            .shared
            .writing_checkpoint
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let mission = self.clone();
        let spawned = thread::Builder::new()
            .name("gigaget-ckpt".to_string())
            .spawn(move || {
                {
                    // The write stays under the lock: a finish that removes
                    // the checkpoint must not be followed by a stale write.
                    let st = mission.lock();
                    mission.write_checkpoint_locked(&st);
                }
                mission.shared.writing_checkpoint.store(false, Ordering::Release);
            });
        if let Err(e) = spawned {
            tracing::warn!(mission = %self.name(), "could not spawn checkpoint writer: {}", e);
            self.shared.writing_checkpoint.store(false, Ordering::Release);
        }
    }

    /// Persist `st`; a finished or deleted mission keeps no checkpoint.
    fn write_checkpoint_locked(&self, st: &MissionState) {
        if st.finished || st.discarded {
            return;
        }
        let record = st.to_record(self.name(), self.url(), self.location());
        match self.shared.checkpoint.save(&record) {
            Ok(()) => tracing::trace!(mission = %self.name(), done = st.done, "checkpoint written"),
            Err(e) => tracing::warn!(mission = %self.name(), "checkpoint write failed: {:#}", e),
        }
    }
}
