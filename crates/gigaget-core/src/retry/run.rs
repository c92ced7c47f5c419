//! Retry loop around one block fetch.

use super::policy::RetryPolicy;
use crate::transfer::TransferError;

/// Runs `f` until it succeeds or `policy` gives up, sleeping the backoff in
/// between. `keep_going` is checked before every wait so a paused mission
/// does not sit out a backoff.
pub fn run_with_retry<T, F, K>(policy: &RetryPolicy, keep_going: K, mut f: F) -> Result<T, TransferError>
where
    F: FnMut() -> Result<T, TransferError>,
    K: Fn() -> bool,
{
    let mut attempt = 1u32;
    loop {
        let err = match f() {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        match policy.next_delay(attempt, &err) {
            Some(delay) if keep_going() => {
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "block fetch failed, retrying: {}", err);
                std::thread::sleep(delay);
                attempt += 1;
            }
            _ => return Err(err),
        }
    }
}
