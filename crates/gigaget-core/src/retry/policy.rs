//! Backoff schedule for block fetches.

use std::time::Duration;

use super::classify::is_transient;
use crate::transfer::TransferError;

/// Capped exponential backoff, built from the `[retry]` config section.
/// Without that section every block gets a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per block, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`,
    /// at most `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before the next fetch after attempt `attempt` failed with
    /// `error`, or `None` when the block should fail now.
    pub fn next_delay(&self, attempt: u32, error: &TransferError) -> Option<Duration> {
        if attempt >= self.max_attempts || !is_transient(error) {
            return None;
        }
        Some(self.backoff(attempt))
    }
}
