//! Resumable, multi-threaded HTTP downloads.
//!
//! A [`mission::Mission`] downloads one URL into `<location>/<name>`. Servers
//! that honour `Range` requests are fetched by several workers in parallel,
//! block by block, with progress checkpointed next to the output file so an
//! interrupted mission resumes where it stopped. Servers that don't are
//! streamed by a single fallback worker. [`manager::MissionManager`] keeps a
//! catalog of missions across runs.

pub mod blocks;
pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod listener;
pub mod logging;
pub mod manager;
pub mod mission;
pub mod naming;
pub mod retry;
pub mod storage;
pub mod transfer;
