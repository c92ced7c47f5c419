//! Foreground progress for one mission until it finishes, fails or Ctrl-C.

use anyhow::{bail, Result};
use gigaget_core::catalog::MissionCatalog;
use gigaget_core::listener::{MissionEvent, MissionListener, TokioContext};
use gigaget_core::mission::{Mission, MissionStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::Manager;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

struct Forward(mpsc::UnboundedSender<MissionEvent>);

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

fn print_progress(done: u64, total: u64, started: Instant) {
    let done_mib = done as f64 / 1_048_576.0;
    let total_mib = total as f64 / 1_048_576.0;
    let pct = if total > 0 { done as f64 / total as f64 * 100.0 } else { 0.0 };
    let elapsed = started.elapsed().as_secs_f64();
    let rate_mib = if elapsed > 0.0 { done_mib / elapsed } else { 0.0 };
    println!(
        "\r  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ",
        done_mib, total_mib, pct, rate_mib
    );
}

/// Print progress for the mission at `index` until a terminal event. Ctrl-C
/// pauses it and leaves a checkpoint behind for `gigaget resume`.
pub async fn follow(manager: &Manager, index: usize) -> Result<()> {
    let mission = manager.get_mission(index)?.clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _guard = mission.subscribe(Arc::new(Forward(tx)), Arc::new(TokioContext::current()));

    let started = Instant::now();
    let mut last_print = Instant::now();
    let outcome = loop {
        // Events delivered before the subscription are reflected in the status.
        match mission.status() {
            MissionStatus::Finished => break MissionStatus::Finished,
            MissionStatus::Failed(code) => break MissionStatus::Failed(code),
            _ => {}
        }
        tokio::select! {
            event = rx.recv() => match event {
                Some(MissionEvent::Progress { done, total }) => {
                    if last_print.elapsed() >= PROGRESS_INTERVAL || done >= total {
                        print_progress(done, total, started);
                        last_print = Instant::now();
                    }
                }
                Some(MissionEvent::Finished) => break MissionStatus::Finished,
                Some(MissionEvent::Error(code)) => break MissionStatus::Failed(code),
                None => break mission.status(),
            },
            _ = tokio::signal::ctrl_c() => {
                mission.pause();
                mission.save_checkpoint();
                break MissionStatus::Paused;
            }
        }
    };

    if let Err(e) = manager.catalog().update(&mission) {
        tracing::warn!(mission = %mission.name(), "could not update catalog: {:#}", e);
    }

    match outcome {
        MissionStatus::Finished => {
            println!("Finished {} ({} bytes)", mission.output_path().display(), mission.length());
            Ok(())
        }
        MissionStatus::Paused => {
            println!(
                "\nPaused {} at {} / {} bytes. Run `gigaget resume {}` to continue.",
                mission.name(),
                mission.done(),
                mission.length(),
                index
            );
            Ok(())
        }
        MissionStatus::Failed(code) => bail!("mission {} failed with code {}", mission.name(), code),
        other => bail!("mission {} stopped unexpectedly ({:?})", mission.name(), other),
    }
}
