use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per block (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/gigaget/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GigagetConfig {
    /// Size of one block in bytes; the unit of work for segmented workers.
    pub block_size: u64,
    /// Default number of segmented workers per mission.
    pub worker_count: usize,
    /// Chunk size used by the single-stream fallback worker.
    pub fallback_chunk_bytes: usize,
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Abort a transfer when throughput stays below this many bytes/s ...
    pub low_speed_limit_bytes: u32,
    /// ... for this many seconds.
    pub low_speed_time_secs: u64,
    /// Hard wall-clock cap for a single request.
    pub max_transfer_secs: u64,
    /// Optional retry policy for block fetches; if missing, blocks are not retried.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for GigagetConfig {
    fn default() -> Self {
        Self {
            block_size: 512 * 1024,
            worker_count: 3,
            fallback_chunk_bytes: 512,
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            max_transfer_secs: 3600,
            retry: None,
        }
    }
}

impl GigagetConfig {
    /// Retry policy for block fetches. A missing section means one attempt only.
    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.retry {
            Some(r) => r.to_policy(),
            None => RetryPolicy::single_attempt(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("gigaget")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GigagetConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GigagetConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: GigagetConfig = toml::from_str(&data)?;
    Ok(cfg)
}
