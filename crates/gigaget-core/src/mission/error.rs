//! Synchronous mission errors and the numeric codes reported to listeners.

/// No error recorded.
pub const NO_ERROR: i32 = -1;

/// The server answered with a status the active transfer mode can't use.
///
/// The value is a reserved identifier persisted in checkpoints; it is not an
/// HTTP status even though it happens to equal one.
pub const ERROR_SERVER_UNSUPPORTED: i32 = 206;

/// Any other transport or I/O failure during a transfer.
pub const ERROR_UNKNOWN: i32 = 233;

/// Errors raised at the call site; never delivered through listeners.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MissionError {
    #[error("mission {0} must not be empty")]
    EmptyField(&'static str),
    #[error("block {index} out of range (block count {block_count})")]
    BlockOutOfRange { index: u64, block_count: u64 },
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("block size must be at least 1 byte")]
    ZeroBlockSize,
}
