//! Retry and backoff for block fetches.
//!
//! A failed block fetch is attempted again only when the failure is
//! transient and the mission is still running; otherwise it goes straight to
//! the worker boundary as the mission's error.

mod classify;
mod policy;
mod run;

pub use classify::is_transient;
pub use policy::RetryPolicy;
pub use run::run_with_retry;
