//! `gigaget remove` – drop a mission with its partial file and checkpoint.

use anyhow::Result;

use super::Manager;

pub fn run_remove(manager: &mut Manager, index: usize) -> Result<()> {
    let name = manager.get_mission(index)?.name().to_string();
    manager.pause_mission(index)?;
    manager.delete_mission(index)?;
    println!("Removed mission {} ({})", index, name);
    Ok(())
}
