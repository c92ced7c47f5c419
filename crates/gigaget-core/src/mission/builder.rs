use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use super::error::MissionError;
use super::state::MissionState;
use super::Mission;
use crate::checkpoint::CheckpointStore;
use crate::config::GigagetConfig;
use crate::transfer::{ProbeResult, TransferOptions};

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builds a [`Mission`], either fresh or rehydrated from its checkpoint.
///
/// ```no_run
/// use gigaget_core::mission::MissionBuilder;
///
/// let mission = MissionBuilder::new("http://example.com/a.iso", "/tmp/dl", "a.iso")
///     .worker_count(4)
///     .restore()?;
/// mission.start();
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MissionBuilder {
    url: String,
    location: PathBuf,
    name: String,
    block_size: u64,
    worker_count: usize,
    transfer: TransferOptions,
    timestamp: Option<u64>,
    probe: Option<ProbeResult>,
    completed: Option<u64>,
}

impl MissionBuilder {
    pub fn new(url: impl Into<String>, location: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        let cfg = GigagetConfig::default();
        Self {
            url: url.into(),
            location: location.into(),
            name: name.into(),
            block_size: cfg.block_size,
            worker_count: cfg.worker_count,
            transfer: TransferOptions::from_config(&cfg),
            timestamp: None,
            probe: None,
            completed: None,
        }
    }

    /// Block size, worker count and transfer options from `cfg`.
    pub fn config(mut self, cfg: &GigagetConfig) -> Self {
        self.block_size = cfg.block_size;
        self.worker_count = cfg.worker_count;
        self.transfer = TransferOptions::from_config(cfg);
        self
    }

    pub fn block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn transfer_options(mut self, transfer: TransferOptions) -> Self {
        self.transfer = transfer;
        self
    }

    /// Creation time in ms since the epoch. Defaults to now.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Server capabilities already known; `start` skips the probe.
    pub fn probed(mut self, probe: ProbeResult) -> Self {
        self.probe = Some(probe);
        self
    }

    /// A mission whose download already completed (catalog entries).
    pub fn completed(mut self, length: u64) -> Self {
        self.completed = Some(length);
        self
    }

    fn validate(&self) -> Result<(), MissionError> {
        if self.url.is_empty() {
            return Err(MissionError::EmptyField("url"));
        }
        if self.name.is_empty() {
            return Err(MissionError::EmptyField("name"));
        }
        if self.location.as_os_str().is_empty() {
            return Err(MissionError::EmptyField("location"));
        }
        if self.worker_count == 0 {
            return Err(MissionError::NoWorkers);
        }
        if self.block_size == 0 {
            return Err(MissionError::ZeroBlockSize);
        }
        Ok(())
    }

    /// Fresh mission; any checkpoint on disk is ignored.
    pub fn build(self) -> Result<Mission, MissionError> {
        self.validate()?;
        let timestamp = self.timestamp.unwrap_or_else(now_millis);
        let mut state = MissionState::new(self.block_size, self.worker_count, timestamp);
        if let Some(probe) = &self.probe {
            state.apply_probe(probe);
        }
        if let Some(length) = self.completed {
            state.probed = true;
            state.length = length;
            state.length_known = true;
            state.done = length;
            state.finished = true;
        }
        Ok(Mission::from_parts(self.name, self.url, self.location, self.transfer, state))
    }

    /// Rehydrate from `<location>/<name>.giga` when present, else build fresh.
    /// A rehydrated mission is not running and reports `is_recovered()`.
    pub fn restore(self) -> anyhow::Result<Mission> {
        self.validate()?;
        let store = CheckpointStore::for_mission(&self.location, &self.name);
        let Some(record) = store.load()? else {
            return Ok(self.build()?);
        };
        if record.url != self.url {
            tracing::warn!(
                mission = %self.name,
                checkpoint_url = %record.url,
                "checkpoint was written for a different url; using it anyway"
            );
        }
        if record.block_size == 0 {
            anyhow::bail!("checkpoint {} has a zero block size", store.path().display());
        }
        let state = MissionState::from_record(record);
        tracing::info!(mission = %self.name, done = state.done, length = state.length, "mission restored from checkpoint");
        Ok(Mission::from_parts(self.name, self.url, self.location, self.transfer, state))
    }
}

