//! `gigaget list` – print every known mission.

use gigaget_core::mission::MissionStatus;

use super::Manager;

fn status_label(status: MissionStatus) -> String {
    match status {
        MissionStatus::Idle => "idle".to_string(),
        MissionStatus::Running => "running".to_string(),
        MissionStatus::Paused => "paused".to_string(),
        MissionStatus::Finished => "finished".to_string(),
        MissionStatus::Failed(code) => format!("error {}", code),
    }
}

fn percent(done: u64, length: u64) -> String {
    if length == 0 {
        return "-".to_string();
    }
    format!("{:.1}%", done as f64 / length as f64 * 100.0)
}

pub fn run_list(manager: &Manager) {
    if manager.count() == 0 {
        println!("No missions.");
        return;
    }
    println!("{:<6} {:<10} {:>7} {:<40}", "INDEX", "STATE", "DONE", "FILE");
    for (index, mission) in manager.missions().iter().enumerate() {
        println!(
            "{:<6} {:<10} {:>7} {:<40}",
            index,
            status_label(mission.status()),
            percent(mission.done(), mission.length()),
            mission.output_path().display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_unknown_length_is_a_dash() {
        assert_eq!(percent(10, 0), "-");
        assert_eq!(percent(512, 1024), "50.0%");
    }

    #[test]
    fn failed_label_carries_the_code() {
        assert_eq!(status_label(MissionStatus::Failed(206)), "error 206");
        assert_eq!(status_label(MissionStatus::Paused), "paused");
    }
}
