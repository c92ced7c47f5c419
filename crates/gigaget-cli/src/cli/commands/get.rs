//! `gigaget get` – create a mission and download it in the foreground.

use anyhow::Result;
use gigaget_core::naming;
use std::path::Path;

use super::follow::follow;
use super::Manager;

pub async fn run_get(
    manager: &mut Manager,
    url: &str,
    name: Option<String>,
    dir: &Path,
    workers: Option<usize>,
    overwrite: bool,
) -> Result<()> {
    let name = match name {
        Some(n) => naming::sanitize(&n),
        None => naming::file_name_from_url(url),
    };
    let workers = workers.unwrap_or(manager.config().worker_count);
    let index = manager.start_mission(url, dir, &name, overwrite, workers)?;
    let mission = manager.get_mission(index)?;
    println!("Downloading {} -> {}", url, mission.output_path().display());
    follow(manager, index).await
}
