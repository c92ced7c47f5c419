//! Integration tests: real missions against the in-process range server.

mod common;

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::range_server::{RangeServer, ServerOptions};
use gigaget_core::blocks::BlockBitmap;
use gigaget_core::checkpoint::{CheckpointRecord, CheckpointStore, CHECKPOINT_VERSION};
use gigaget_core::listener::{EventLoop, MissionEvent, MissionListener, TokioContext};
use gigaget_core::mission::{Mission, MissionBuilder, ERROR_SERVER_UNSUPPORTED, ERROR_UNKNOWN, NO_ERROR};
use gigaget_core::retry::RetryPolicy;
use gigaget_core::transfer::TransferOptions;
use tempfile::tempdir;

const TIMEOUT: Duration = Duration::from_secs(20);

/// Forwards every event into a channel.
struct Forward(mpsc::Sender<MissionEvent>);

impl MissionListener for Forward {
    fn on_progress(&self, _: &Mission, done: u64, total: u64) {
        let _ = self.0.send(MissionEvent::Progress { done, total });
    }
    fn on_finish(&self, _: &Mission) {
        let _ = self.0.send(MissionEvent::Finished);
    }
    fn on_error(&self, _: &Mission, code: i32) {
        let _ = self.0.send(MissionEvent::Error(code));
    }
}

fn watch(mission: &Mission) -> mpsc::Receiver<MissionEvent> {
    let (tx, rx) = mpsc::channel();
    let events = Arc::new(EventLoop::new("test-events").unwrap());
    mission.add_listener(Arc::new(Forward(tx)), events);
    rx
}

/// Collect events until a terminal one (finish or error) arrives.
fn until_terminal(rx: &mpsc::Receiver<MissionEvent>) -> Vec<MissionEvent> {
    let deadline = Instant::now() + TIMEOUT;
    let mut seen = Vec::new();
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        let event = rx.recv_timeout(left).expect("mission did not reach a terminal state in time");
        seen.push(event);
        if matches!(event, MissionEvent::Finished | MissionEvent::Error(_)) {
            return seen;
        }
    }
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn body(len: usize) -> Vec<u8> {
    (0u8..=250).cycle().take(len).collect()
}

fn assert_progress_monotonic(events: &[MissionEvent]) {
    let mut last = 0;
    for event in events {
        if let MissionEvent::Progress { done, total } = *event {
            assert!(done >= last, "done went backwards: {last} -> {done}");
            assert!(done <= total, "done {done} above total {total}");
            last = done;
        }
    }
}

#[test]
fn segmented_download_completes_and_file_matches() {
    let data = body(1000);
    let server = RangeServer::start(data.clone());
    let dir = tempdir().unwrap();
    let mission = MissionBuilder::new(server.url("file.bin"), dir.path(), "file.bin")
        .block_size(256)
        .worker_count(3)
        .build()
        .unwrap();
    let rx = watch(&mission);

    mission.start();
    let events = until_terminal(&rx);

    assert_eq!(events.last(), Some(&MissionEvent::Finished));
    assert_progress_monotonic(&events);
    assert!(!mission.is_fallback());
    assert_eq!(mission.block_count(), 4);
    assert_eq!(mission.length(), 1000);
    assert_eq!(mission.done(), 1000);
    assert!(mission.is_finished());
    assert!(!mission.is_running());
    assert_eq!(mission.error_code(), NO_ERROR);
    assert!(!mission.checkpoint_path().exists());
    assert_eq!(std::fs::read(mission.output_path()).unwrap(), data);

    let mut blocks = server.block_requests();
    blocks.sort();
    assert_eq!(blocks, vec![(0, 255), (256, 511), (512, 767), (768, 999)]);
}

#[test]
fn server_without_ranges_uses_fallback() {
    let data = body(5000);
    let server = RangeServer::start_with(
        data.clone(),
        ServerOptions {
            support_ranges: false,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mission = MissionBuilder::new(server.url("plain.bin"), dir.path(), "plain.bin")
        .block_size(256)
        .worker_count(3)
        .build()
        .unwrap();
    let rx = watch(&mission);

    mission.start();
    let events = until_terminal(&rx);

    assert_eq!(events.last(), Some(&MissionEvent::Finished));
    assert_progress_monotonic(&events);
    assert!(mission.is_fallback());
    assert_eq!(mission.worker_count(), 1);
    assert_eq!(mission.done(), 5000);
    assert_eq!(mission.length(), 5000);
    assert_eq!(std::fs::read(mission.output_path()).unwrap(), data);
    // 512-byte chunks: at least one progress event per chunk.
    let progress = events
        .iter()
        .filter(|e| matches!(e, MissionEvent::Progress { .. }))
        .count();
    assert!(progress >= 10, "expected chunked progress, got {progress} events");
}

#[test]
fn not_found_ends_with_server_unsupported() {
    let server = RangeServer::start_with(
        body(100),
        ServerOptions {
            status_override: Some(404),
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mission = MissionBuilder::new(server.url("missing.bin"), dir.path(), "missing.bin")
        .build()
        .unwrap();
    let rx = watch(&mission);

    mission.start();
    let events = until_terminal(&rx);

    assert_eq!(events.last(), Some(&MissionEvent::Error(ERROR_SERVER_UNSUPPORTED)));
    wait_until(|| !mission.is_running());
    assert!(!mission.is_finished());
    assert_eq!(mission.error_code(), ERROR_SERVER_UNSUPPORTED);
    // The failure point is checkpointed.
    assert!(mission.checkpoint_path().exists());
}

#[test]
fn preserved_blocks_are_not_requested_after_restore() {
    let data = body(1000);
    let server = RangeServer::start(data.clone());
    let dir = tempdir().unwrap();
    let url = server.url("resume.bin");

    // Blocks 0 and 2 are already on disk from an earlier run.
    let mut partial = vec![0u8; 1000];
    partial[0..256].copy_from_slice(&data[0..256]);
    partial[512..768].copy_from_slice(&data[512..768]);
    std::fs::write(dir.path().join("resume.bin"), &partial).unwrap();
    let mut blocks = BlockBitmap::new(4);
    blocks.set(0);
    blocks.set(2);
    let record = CheckpointRecord {
        version: CHECKPOINT_VERSION,
        name: "resume.bin".to_string(),
        url: url.clone(),
        location: dir.path().to_path_buf(),
        length: 1000,
        done: 512,
        block_size: 256,
        block_count: 4,
        blocks,
        worker_count: 3,
        worker_positions: vec![3, 1, 5],
        finished_workers: 0,
        finished: false,
        fallback: false,
        probed: true,
        length_known: true,
        error_code: NO_ERROR,
        timestamp: 1,
    };
    CheckpointStore::for_mission(dir.path(), "resume.bin")
        .save(&record)
        .unwrap();

    let mission = MissionBuilder::new(url, dir.path(), "resume.bin").restore().unwrap();
    assert!(mission.is_recovered());
    assert_eq!(mission.done(), 512);
    let rx = watch(&mission);

    mission.start();
    let events = until_terminal(&rx);

    assert_eq!(events.last(), Some(&MissionEvent::Finished));
    assert_eq!(mission.done(), 1000);
    assert_eq!(std::fs::read(mission.output_path()).unwrap(), data);
    let mut requested = server.block_requests();
    requested.sort();
    assert_eq!(requested, vec![(256, 511), (768, 999)]);
    // Already probed: no capability requests.
    assert!(!server.requested_ranges().contains(&Some((0, 0))));
}

#[test]
fn pause_then_resume_finishes_the_download() {
    let data = body(64 * 1024);
    let server = RangeServer::start_with(
        data.clone(),
        ServerOptions {
            body_delay: Some(Duration::from_millis(20)),
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mission = MissionBuilder::new(server.url("big.bin"), dir.path(), "big.bin")
        .block_size(4096)
        .worker_count(2)
        .build()
        .unwrap();
    let rx = watch(&mission);

    mission.start();
    let first = rx.recv_timeout(TIMEOUT).expect("no progress");
    assert!(matches!(first, MissionEvent::Progress { .. }));
    mission.pause();
    assert!(!mission.is_running());
    assert!(mission.is_recovered());
    wait_until(|| mission.checkpoint_path().exists());
    // Let in-flight requests drain.
    std::thread::sleep(Duration::from_millis(300));
    assert!(!mission.is_finished());

    mission.start();
    let events = until_terminal(&rx);
    assert_eq!(events.last(), Some(&MissionEvent::Finished));
    assert!(mission.is_finished());
    assert_eq!(mission.done(), data.len() as u64);
    assert!(!mission.checkpoint_path().exists());
    assert_eq!(std::fs::read(mission.output_path()).unwrap(), data);
}

#[test]
fn removed_listener_gets_nothing_from_later_runs() {
    let server = RangeServer::start(body(2048));
    let dir = tempdir().unwrap();
    let mission = MissionBuilder::new(server.url("quiet.bin"), dir.path(), "quiet.bin")
        .block_size(512)
        .build()
        .unwrap();
    let (tx, silent) = mpsc::channel();
    let events = Arc::new(EventLoop::new("silent-events").unwrap());
    let guard = mission.subscribe(Arc::new(Forward(tx)), events);
    drop(guard);
    let rx = watch(&mission);

    mission.start();
    until_terminal(&rx);
    assert!(silent.recv_timeout(Duration::from_millis(200)).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tokio_context_receives_events() {
    let data = body(3000);
    let server = RangeServer::start(data.clone());
    let dir = tempdir().unwrap();
    let mission = MissionBuilder::new(server.url("async.bin"), dir.path(), "async.bin")
        .block_size(1024)
        .build()
        .unwrap();
    let (tx, rx) = mpsc::channel();
    mission.add_listener(Arc::new(Forward(tx)), Arc::new(TokioContext::current()));

    mission.start();
    let events = tokio::task::spawn_blocking(move || until_terminal(&rx))
        .await
        .unwrap();
    assert_eq!(events.last(), Some(&MissionEvent::Finished));
    assert_progress_monotonic(&events);
    assert_eq!(std::fs::read(mission.output_path()).unwrap(), data);
}

#[test]
fn failed_probe_of_a_replaced_start_does_not_stop_the_new_run() {
    let data = body(1000);
    let server = RangeServer::start_with(
        data.clone(),
        ServerOptions {
            stall_first_probe: Some(Duration::from_millis(600)),
            body_delay: Some(Duration::from_millis(700)),
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mission = MissionBuilder::new(server.url("restart.bin"), dir.path(), "restart.bin")
        .block_size(256)
        .worker_count(2)
        .build()
        .unwrap();
    let rx = watch(&mission);

    mission.start();
    std::thread::sleep(Duration::from_millis(100));
    mission.pause();
    mission.start();
    let events = until_terminal(&rx);

    assert_eq!(events.last(), Some(&MissionEvent::Finished));
    assert_eq!(mission.error_code(), NO_ERROR);
    assert!(mission.is_finished());
    assert_eq!(std::fs::read(mission.output_path()).unwrap(), data);
}

#[test]
fn block_cut_short_ends_with_unknown_error() {
    let server = RangeServer::start_with(
        body(1000),
        ServerOptions {
            truncate_blocks: usize::MAX,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mission = MissionBuilder::new(server.url("cut.bin"), dir.path(), "cut.bin")
        .block_size(256)
        .worker_count(3)
        .build()
        .unwrap();
    let rx = watch(&mission);

    mission.start();
    let events = until_terminal(&rx);

    assert_eq!(events.last(), Some(&MissionEvent::Error(ERROR_UNKNOWN)));
    wait_until(|| !mission.is_running());
    assert!(!mission.is_finished());
    assert_eq!(mission.error_code(), ERROR_UNKNOWN);
    assert!(mission.done() < 1000);
    let record = CheckpointStore::for_mission(dir.path(), "cut.bin")
        .load()
        .unwrap()
        .expect("checkpoint written at the failure");
    assert_eq!(record.error_code, ERROR_UNKNOWN);
}

#[test]
fn cut_block_is_retried_from_where_it_stopped() {
    let data = body(1000);
    let server = RangeServer::start_with(
        data.clone(),
        ServerOptions {
            truncate_blocks: 1,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let transfer = TransferOptions {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        },
        ..Default::default()
    };
    let mission = MissionBuilder::new(server.url("retry.bin"), dir.path(), "retry.bin")
        .block_size(256)
        .worker_count(1)
        .transfer_options(transfer)
        .build()
        .unwrap();
    let rx = watch(&mission);

    mission.start();
    let events = until_terminal(&rx);

    assert_eq!(events.last(), Some(&MissionEvent::Finished));
    assert_progress_monotonic(&events);
    assert_eq!(mission.done(), 1000);
    assert_eq!(std::fs::read(mission.output_path()).unwrap(), data);
    let mut requested = server.block_requests();
    requested.sort();
    assert_eq!(
        requested,
        vec![(0, 255), (128, 255), (256, 511), (512, 767), (768, 999)]
    );
}

#[test]
fn block_answered_without_range_is_server_unsupported() {
    let server = RangeServer::start_with(
        body(1000),
        ServerOptions {
            ignore_block_ranges: true,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mission = MissionBuilder::new(server.url("noranges.bin"), dir.path(), "noranges.bin")
        .block_size(256)
        .worker_count(3)
        .build()
        .unwrap();
    let rx = watch(&mission);

    mission.start();
    let events = until_terminal(&rx);

    assert_eq!(events.last(), Some(&MissionEvent::Error(ERROR_SERVER_UNSUPPORTED)));
    wait_until(|| !mission.is_running());
    // The probe got its 206; only the blocks were refused.
    assert!(!mission.is_fallback());
    assert!(!mission.is_finished());
    assert_eq!(mission.error_code(), ERROR_SERVER_UNSUPPORTED);
    assert!(mission.checkpoint_path().exists());
}

#[test]
fn fallback_stops_between_chunks_and_restarts_from_zero() {
    const LEN: usize = 2 * 1024 * 1024;
    const PAUSE_AT: u64 = 64 * 1024;
    let data = body(LEN);
    let server = RangeServer::start_with(
        data.clone(),
        ServerOptions {
            support_ranges: false,
            chunk_delay: Some(Duration::from_millis(5)),
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mission = MissionBuilder::new(server.url("stream.bin"), dir.path(), "stream.bin")
        .build()
        .unwrap();
    let rx = watch(&mission);

    mission.start();
    loop {
        match rx.recv_timeout(TIMEOUT).expect("no progress") {
            MissionEvent::Progress { done, .. } if done >= PAUSE_AT => break,
            MissionEvent::Progress { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    mission.pause();

    // Long enough for the server to have sent everything to a worker that
    // kept reading.
    std::thread::sleep(Duration::from_millis(1500));
    assert!(mission.is_fallback());
    assert!(!mission.is_finished());
    assert!(mission.done() < LEN as u64);
    let written = std::fs::metadata(mission.output_path()).unwrap().len();
    assert!(written < LEN as u64, "worker kept streaming after pause: {written} bytes");
    while rx.try_recv().is_ok() {}

    mission.start();
    let events = until_terminal(&rx);
    match events.first() {
        Some(MissionEvent::Progress { done, .. }) => assert!(*done < PAUSE_AT, "restart resumed at {done}"),
        other => panic!("expected progress first, got {other:?}"),
    }
    assert_eq!(events.last(), Some(&MissionEvent::Finished));
    assert_progress_monotonic(&events);
    assert_eq!(mission.done(), LEN as u64);
    assert_eq!(std::fs::read(mission.output_path()).unwrap(), data);
    assert_eq!(server.plain_requests(), 2);
}
