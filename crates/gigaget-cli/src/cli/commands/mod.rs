//! CLI command handlers. Each command is in its own file.

mod follow;
mod get;
mod list;
mod remove;
mod resume;

use gigaget_core::catalog::JsonCatalog;
use gigaget_core::manager::MissionManager;
use gigaget_core::mission::Mission;

pub use get::run_get;
pub use list::run_list;
pub use remove::run_remove;
pub use resume::run_resume;

/// The manager every command works on: real missions, JSON catalog.
pub type Manager = MissionManager<Mission, JsonCatalog>;
