//! LivePolls - realtime poll state sync engine
//!
//! This is the binary entry point. All logic lives in the library crates.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use polls_app::config::init_config_dir;

/// LivePolls - realtime poll state sync engine
#[derive(Parser, Debug)]
#[command(name = "livepolls")]
#[command(about = "Replay and inspect the LivePolls sync engine", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay an NDJSON script against the in-memory backend
    Replay {
        /// Path to the script
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Directory holding .livepolls/config.toml
        #[arg(long, value_name = "PATH")]
        project: Option<PathBuf>,
    },

    /// Write the default .livepolls/config.toml
    Init {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    polls_core::logging::init()?;

    match args.command {
        Command::Replay { script, project } => {
            let project = project.unwrap_or_else(current_dir);
            live_polls::run_replay(&script, &project).await?;
        }
        Command::Init { path } => {
            let path = path.unwrap_or_else(current_dir);
            init_config_dir(&path)?;
            eprintln!(
                "Wrote {}",
                path.join(".livepolls").join("config.toml").display()
            );
        }
    }

    Ok(())
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
