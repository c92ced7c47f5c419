//! CLI for the gigaget downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gigaget_core::catalog::JsonCatalog;
use gigaget_core::config;
use gigaget_core::manager::MissionManager;
use std::path::PathBuf;

use commands::{run_get, run_list, run_remove, run_resume};

/// Top-level CLI for the gigaget downloader.
#[derive(Debug, Parser)]
#[command(name = "gigaget")]
#[command(about = "gigaget: resumable multi-threaded downloads", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL in the foreground. Ctrl-C pauses; `resume` continues later.
    Get {
        /// Direct HTTP/HTTPS URL.
        url: String,
        /// Output file name (default: last URL path segment).
        #[arg(long)]
        name: Option<String>,
        /// Download directory (default: current directory).
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Parallel workers for servers that support ranges.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        /// Replace an existing file of the same name instead of picking a new name.
        #[arg(long)]
        overwrite: bool,
    },

    /// List known missions.
    List,

    /// Resume a paused or failed mission in the foreground.
    Resume {
        /// Mission index as shown by `list`.
        index: usize,
    },

    /// Remove a mission, its partial file and its checkpoint.
    Remove {
        /// Mission index as shown by `list`.
        index: usize,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let catalog = JsonCatalog::open_default(cfg.clone())?;
        let mut manager = MissionManager::open(catalog, cfg)?;

        match cli.command {
            CliCommand::Get {
                url,
                name,
                dir,
                workers,
                overwrite,
            } => {
                let dir = match dir {
                    Some(d) => d,
                    None => std::env::current_dir()?,
                };
                run_get(&mut manager, &url, name, &dir, workers, overwrite).await?;
            }
            CliCommand::List => run_list(&manager),
            CliCommand::Resume { index } => run_resume(&manager, index).await?,
            CliCommand::Remove { index } => run_remove(&mut manager, index)?,
        }

        Ok(())
    }
}
