//! Server capability probe.
//!
//! Runs once before a mission's first start: a HEAD request for the size
//! hints, then a one-byte ranged GET. Only a real `206` with a usable total
//! size selects segmented mode; everything else degrades to the fallback
//! worker.

mod parse;

use std::str;

use super::{new_easy, TransferError, TransferOptions};
use parse::{parse_headers, ResponseHeaders};

/// What the probe learned about the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Total size in bytes, if any response carried it.
    pub length: Option<u64>,
    /// True when the server answered a Range request with `206` and a total size.
    pub supports_ranges: bool,
}

/// Probe `url`. Fails only on transport errors of the ranged GET; an
/// unusable HEAD or an unexpected status just yields a fallback result.
pub fn probe(url: &str, opts: &TransferOptions) -> Result<ProbeResult, TransferError> {
    let head = match fetch_head(url, opts) {
        Ok(h) => Some(h),
        Err(e) => {
            tracing::debug!(url, "HEAD probe failed: {}", e);
            None
        }
    };
    let ranged = fetch_first_byte(url, opts)?;
    let head_length = head
        .as_ref()
        .filter(|h| h.is_success())
        .and_then(|h| h.content_length);

    let result = match (ranged.status, ranged.content_range_total) {
        (Some(206), Some(total)) => ProbeResult {
            length: Some(total),
            supports_ranges: true,
        },
        (Some(200), _) => ProbeResult {
            length: ranged.content_length.or(head_length),
            supports_ranges: false,
        },
        _ => ProbeResult {
            length: head_length,
            supports_ranges: false,
        },
    };
    tracing::debug!(
        url,
        status = ?ranged.status,
        head_accept_ranges = ?head.as_ref().map(|h| h.accept_ranges),
        length = ?result.length,
        supports_ranges = result.supports_ranges,
        "probe finished"
    );
    Ok(result)
}

/// HEAD request; returns the headers of the final response.
fn fetch_head(url: &str, opts: &TransferOptions) -> Result<ResponseHeaders, TransferError> {
    let mut lines: Vec<String> = Vec::new();
    let mut easy = new_easy(url, opts)?;
    easy.nobody(true)?;
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            collect_header(&mut lines, data);
            true
        })?;
        transfer.perform()?;
    }
    Ok(parse_headers(&lines))
}

/// `Range: bytes=0-0` GET. Reads at most one byte of body so a server that
/// ignores the range does not stream the whole file here.
fn fetch_first_byte(url: &str, opts: &TransferOptions) -> Result<ResponseHeaders, TransferError> {
    let mut lines: Vec<String> = Vec::new();
    let mut body_bytes = 0usize;
    let mut easy = new_easy(url, opts)?;
    easy.range("0-0")?;
    let outcome = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            collect_header(&mut lines, data);
            true
        })?;
        transfer.write_function(|data| {
            body_bytes += data.len();
            if body_bytes > 1 {
                return Ok(0);
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };
    match outcome {
        Ok(()) => {}
        // We cut the body short on purpose.
        Err(e) if e.is_write_error() => {}
        Err(e) => return Err(TransferError::Curl(e)),
    }
    Ok(parse_headers(&lines))
}

/// Collect header lines, keeping only the block of the last response
/// (redirects produce several).
fn collect_header(lines: &mut Vec<String>, data: &[u8]) {
    if let Ok(s) = str::from_utf8(data) {
        let line = s.trim_end();
        if line.starts_with("HTTP/") {
            lines.clear();
        }
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
}
