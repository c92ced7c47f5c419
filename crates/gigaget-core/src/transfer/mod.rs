//! HTTP transfers: capability probe, segmented block workers, single-stream fallback.
//!
//! Every request goes through libcurl (curl crate, one `Easy` handle per
//! request). Workers run on their own OS threads and report back to the
//! mission; they never propagate errors past their own boundary.

mod error;
pub(crate) mod fallback;
mod probe;
pub(crate) mod segmented;

pub use error::TransferError;
pub use probe::{probe, ProbeResult};

use crate::config::GigagetConfig;
use crate::retry::RetryPolicy;
use std::time::Duration;

/// Network and retry knobs applied to every request a mission makes.
#[derive(Debug, Clone, Copy)]
pub struct TransferOptions {
    pub connect_timeout: Duration,
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub max_transfer_time: Duration,
    pub retry: RetryPolicy,
    /// Write/progress granularity of the fallback worker.
    pub fallback_chunk_bytes: usize,
}

impl TransferOptions {
    pub fn from_config(cfg: &GigagetConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_limit: cfg.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
            max_transfer_time: Duration::from_secs(cfg.max_transfer_secs),
            retry: cfg.retry_policy(),
            fallback_chunk_bytes: cfg.fallback_chunk_bytes.max(1),
        }
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from_config(&GigagetConfig::default())
    }
}

/// New handle for `url` with redirects and the configured timeouts.
pub(crate) fn new_easy(url: &str, opts: &TransferOptions) -> Result<curl::easy::Easy, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(opts.connect_timeout)?;
    // Abort stalled transfers instead of tying up a worker thread forever.
    easy.low_speed_limit(opts.low_speed_limit)?;
    easy.low_speed_time(opts.low_speed_time)?;
    easy.timeout(opts.max_transfer_time)?;
    Ok(easy)
}

/// Status code from an HTTP status line (`HTTP/1.1 206 Partial Content`).
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    let line = line.trim();
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status_line("HTTP/1.1 206 Partial Content\r\n"), Some(206));
        assert_eq!(parse_status_line("HTTP/2 404"), Some(404));
        assert_eq!(parse_status_line("Content-Length: 10"), None);
        assert_eq!(parse_status_line("HTTP/1.1 abc"), None);
    }

    #[test]
    fn options_follow_config() {
        let mut cfg = GigagetConfig::default();
        cfg.connect_timeout_secs = 5;
        cfg.fallback_chunk_bytes = 0;
        let opts = TransferOptions::from_config(&cfg);
        assert_eq!(opts.connect_timeout, Duration::from_secs(5));
        assert_eq!(opts.fallback_chunk_bytes, 1);
        assert_eq!(opts.retry.max_attempts, 1);
    }
}
