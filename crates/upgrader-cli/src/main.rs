mod config;
mod dispatch;
mod flows;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use crate::dispatch::run_cli;

const LOG_ENV: &str = "UPGRADER_LOG";

#[derive(Parser, Debug)]
#[command(name = "upgrader")]
#[command(about = "Runs application upgrade packages and reports their status", long_about = None)]
struct Cli {
    /// Config file; defaults to $UPGRADER_CONFIG or ./upgrader.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the status of every registered upgrade
    Status,
    /// Run one upgrade, selected by namespace, class name or snake_case title
    Run { upgrade: String },
    /// Run every pending upgrade in priority order
    Upgrade,
    /// Forget that an upgrade ran so it is applied again
    Forget { upgrade: String },
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    init_tracing();
    run_cli(Cli::parse())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
