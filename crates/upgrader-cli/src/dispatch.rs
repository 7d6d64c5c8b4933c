use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::CommandFactory;
use clap_complete::Shell;
use upgrader_runner::RunOutcome;

use crate::config::{resolve_config_path, UpgraderConfig, CONFIG_ENV};
use crate::flows::{
    open_session, run_forget_command, run_pending_command, run_status_command,
    run_upgrade_command, Session,
};
use crate::render::{current_output_style, render_run_summary, ConsoleSink};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let style = current_output_style();
    match cli.command {
        Commands::Completions { shell } => write_completions_script(shell, &mut io::stdout()),
        Commands::Status => {
            let session = open_configured_session(cli.config)?;
            for line in run_status_command(&session, style, Utc::now())? {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Run { upgrade } => {
            let mut session = open_configured_session(cli.config)?;
            let mut sink = ConsoleSink::new(style);
            run_upgrade_command(&mut session, &upgrade, &mut sink)?;
            Ok(())
        }
        Commands::Upgrade => {
            let mut session = open_configured_session(cli.config)?;
            let mut sink = ConsoleSink::new(style);
            let reports = run_pending_command(&mut session, &mut sink)?;
            let skipped = reports
                .iter()
                .filter(|report| report.outcome == RunOutcome::AlreadyMigrated)
                .count();
            println!("{}", render_run_summary(reports.len() - skipped, skipped));
            Ok(())
        }
        Commands::Forget { upgrade } => {
            let mut session = open_configured_session(cli.config)?;
            let (namespace, forgotten) = run_forget_command(&mut session, &upgrade)?;
            if forgotten {
                println!("{namespace} will run again");
            } else {
                println!("{namespace} has no recorded run");
            }
            Ok(())
        }
    }
}

fn open_configured_session(explicit_config: Option<PathBuf>) -> Result<Session> {
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    let config_path = resolve_config_path(
        explicit_config,
        std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        &cwd,
    );
    let config = UpgraderConfig::load(config_path.as_deref())?;
    open_session(config)
}

pub(crate) fn write_completions_script<W: Write>(shell: Shell, writer: &mut W) -> Result<()> {
    let mut command = Cli::command();
    let mut generated = Vec::new();
    clap_complete::generate(shell, &mut command, "upgrader", &mut generated);

    writer
        .write_all(&generated)
        .with_context(|| "failed writing generated completion script")?;
    writer
        .flush()
        .with_context(|| "failed flushing generated completion script")?;
    Ok(())
}
