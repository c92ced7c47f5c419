//! `gigaget resume` – continue a paused or failed mission in the foreground.

use anyhow::Result;

use super::follow::follow;
use super::Manager;

pub async fn run_resume(manager: &Manager, index: usize) -> Result<()> {
    let mission = manager.get_mission(index)?;
    if mission.is_finished() {
        println!("{} is already complete.", mission.output_path().display());
        return Ok(());
    }
    manager.resume_mission(index)?;
    println!("Resuming {} at {} / {} bytes", mission.name(), mission.done(), mission.length());
    follow(manager, index).await
}
