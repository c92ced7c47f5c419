//! Which transfer failures are worth another attempt.

use crate::transfer::TransferError;

/// Timeouts, dropped connections, bodies cut short, throttling and 5xx may go
/// away on the next request. A client error, a status the transfer mode
/// can't use, or a failed disk write will not.
pub fn is_transient(e: &TransferError) -> bool {
    match e {
        TransferError::Curl(ce) => transient_curl_error(ce),
        TransferError::Http(code) => matches!(code, 429 | 500..=599),
        // The rest of the block is requested again from where it stopped.
        TransferError::PartialTransfer { .. } => true,
        TransferError::Storage(_) => false,
    }
}

fn transient_curl_error(e: &curl::Error) -> bool {
    e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
}
