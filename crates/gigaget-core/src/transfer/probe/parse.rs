//! Parse collected response header lines.

use crate::transfer::parse_status_line;

/// Headers of one response that matter to the probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResponseHeaders {
    pub status: Option<u32>,
    pub content_length: Option<u64>,
    /// Total from `Content-Range: bytes a-b/TOTAL`; `None` for `*` or absent.
    pub content_range_total: Option<u64>,
    pub accept_ranges: bool,
}

impl ResponseHeaders {
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }
}

pub(crate) fn parse_headers(lines: &[String]) -> ResponseHeaders {
    let mut out = ResponseHeaders::default();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(code) = parse_status_line(line) {
            out.status = Some(code);
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            out.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("content-range") {
            out.content_range_total = parse_content_range_total(value);
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            out.accept_ranges = value.eq_ignore_ascii_case("bytes");
        }
    }
    out
}

/// `bytes 0-0/1234` → `Some(1234)`; `bytes 0-0/*` → `None`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}
