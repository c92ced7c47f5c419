//! In-process HTTP/1.1 server for the integration tests.
//!
//! Serves one static body. Depending on its options it answers `Range` GETs
//! with `206`, ignores ranges (full `200` body), or answers every request
//! with a fixed status. It can also misbehave on purpose: stall the first
//! one-byte capability request, cut block bodies short, or drip the body out
//! slowly. Every GET's requested range is recorded so tests can check what
//! the workers actually fetched.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Body piece size when `chunk_delay` is set.
const DRIP_CHUNK: usize = 16 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// When false, GET ignores `Range` and sends the whole body with `200`.
    pub support_ranges: bool,
    /// When false, HEAD gets `405`.
    pub head_allowed: bool,
    /// Answer every request with this status and an empty body.
    pub status_override: Option<u16>,
    /// Sleep before sending each GET body.
    pub body_delay: Option<Duration>,
    /// Hold the first `bytes=0-0` request this long, then close it unanswered.
    pub stall_first_probe: Option<Duration>,
    /// Send only half of the body of this many block requests, then close.
    pub truncate_blocks: usize,
    /// Answer block requests (any range except `0-0`) with the full body and `200`.
    pub ignore_block_ranges: bool,
    /// Send bodies in 16 KiB pieces with this pause between them.
    pub chunk_delay: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            head_allowed: true,
            status_override: None,
            body_delay: None,
            stall_first_probe: None,
            truncate_blocks: 0,
            ignore_block_ranges: false,
            chunk_delay: None,
        }
    }
}

/// `(start, end_inclusive)` of a GET's `Range` header; `None` for plain GETs.
pub type RequestedRange = Option<(u64, u64)>;

struct State {
    body: Vec<u8>,
    opts: ServerOptions,
    gets: Mutex<Vec<RequestedRange>>,
    probe_stalled: AtomicBool,
    truncations_left: AtomicUsize,
}

pub struct RangeServer {
    base: String,
    state: Arc<State>,
}

impl RangeServer {
    pub fn start(body: Vec<u8>) -> Self {
        Self::start_with(body, ServerOptions::default())
    }

    pub fn start_with(body: Vec<u8>, opts: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let state = Arc::new(State {
            body,
            opts,
            gets: Mutex::new(Vec::new()),
            probe_stalled: AtomicBool::new(false),
            truncations_left: AtomicUsize::new(opts.truncate_blocks),
        });
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{port}/"),
            state,
        }
    }

    /// URL of `name` on this server; every path serves the same body.
    pub fn url(&self, name: &str) -> String {
        format!("{}{}", self.base, name)
    }

    /// Ranges of every GET served so far, in arrival order.
    pub fn requested_ranges(&self) -> Vec<RequestedRange> {
        self.state.gets.lock().unwrap().clone()
    }

    /// Ranged GETs only, excluding the one-byte capability probe.
    pub fn block_requests(&self) -> Vec<(u64, u64)> {
        self.requested_ranges()
            .into_iter()
            .flatten()
            .filter(|&r| r != (0, 0))
            .collect()
    }

    /// GETs without a `Range` header.
    pub fn plain_requests(&self) -> usize {
        self.requested_ranges().iter().filter(|r| r.is_none()).count()
    }
}

fn handle(mut stream: TcpStream, state: &State) {
    let opts = state.opts;
    let body = &state.body[..];
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    if let Some(status) = opts.status_override {
        if method == "GET" {
            state.gets.lock().unwrap().push(range);
        }
        let head = format!("HTTP/1.1 {status} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let _ = stream.write_all(head.as_bytes());
        return;
    }

    match method {
        "HEAD" if !opts.head_allowed => {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        }
        "HEAD" => {
            let accept = if opts.support_ranges { "Accept-Ranges: bytes\r\n" } else { "" };
            let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n{accept}Connection: close\r\n\r\n");
            let _ = stream.write_all(head.as_bytes());
        }
        "GET" => {
            state.gets.lock().unwrap().push(range);
            let is_probe = range == Some((0, 0));
            if is_probe {
                if let Some(stall) = opts.stall_first_probe {
                    if !state.probe_stalled.swap(true, Ordering::SeqCst) {
                        thread::sleep(stall);
                        return;
                    }
                }
            }
            let honor_range = opts.support_ranges && (is_probe || !opts.ignore_block_ranges);
            let (head, slice) = match range.filter(|_| honor_range) {
                Some((start, end)) if start < total => {
                    let end = end.min(total - 1);
                    let slice = &body[start as usize..=end as usize];
                    let head = format!(
                        "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {start}-{end}/{total}\r\nAccept-Ranges: bytes\r\nConnection: close\r\n\r\n",
                        slice.len()
                    );
                    (head, slice)
                }
                Some(_) => (
                    format!("HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{total}\r\nContent-Length: 0\r\n\r\n"),
                    &body[0..0],
                ),
                None => (
                    format!("HTTP/1.1 200 OK\r\nContent-Length: {total}\r\nConnection: close\r\n\r\n"),
                    body,
                ),
            };
            let _ = stream.write_all(head.as_bytes());
            if let Some(delay) = opts.body_delay {
                thread::sleep(delay);
            }
            let cut = range.is_some()
                && !is_probe
                && state
                    .truncations_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
            let slice = if cut { &slice[..slice.len() / 2] } else { slice };
            send_body(&mut stream, slice, opts.chunk_delay);
        }
        _ => {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        }
    }
}

fn send_body(stream: &mut TcpStream, body: &[u8], chunk_delay: Option<Duration>) {
    let Some(delay) = chunk_delay else {
        let _ = stream.write_all(body);
        return;
    };
    for piece in body.chunks(DRIP_CHUNK) {
        // The client hung up.
        if stream.write_all(piece).is_err() {
            return;
        }
        thread::sleep(delay);
    }
}

/// Method and `Range: bytes=a-b` of a request head.
fn parse_request(request: &str) -> (&str, RequestedRange) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        if let Some((a, b)) = value.trim().strip_prefix("bytes=").and_then(|v| v.split_once('-')) {
            let start = a.trim().parse().unwrap_or(0);
            let end = b.trim().parse().unwrap_or(u64::MAX);
            range = Some((start, end));
        }
    }
    (method, range)
}
