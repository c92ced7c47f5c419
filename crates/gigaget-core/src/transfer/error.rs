//! Transfer failure type shared by both worker kinds.

use crate::mission::{ERROR_SERVER_UNSUPPORTED, ERROR_UNKNOWN};

/// Failure of one request made by a worker or the capability probe.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// libcurl failed (timeout, connection, TLS, …).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// The response status is not acceptable for the active transfer mode.
    #[error("HTTP {0}")]
    Http(u32),
    /// The body ended before the requested range was complete.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Writing to the output file failed (disk full, permission denied, …).
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
}

impl TransferError {
    /// Listener-facing code for this failure.
    pub fn error_code(&self) -> i32 {
        match self {
            TransferError::Http(_) => ERROR_SERVER_UNSUPPORTED,
            _ => ERROR_UNKNOWN,
        }
    }

    pub(crate) fn storage(e: anyhow::Error) -> Self {
        let io_err = e
            .downcast::<std::io::Error>()
            .unwrap_or_else(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{:#}", e)));
        TransferError::Storage(io_err)
    }
}
