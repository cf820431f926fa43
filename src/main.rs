mod agents;
mod backend;
mod cli;
mod config;
mod error;
mod pip;
#[cfg(test)]
mod testing;
mod utils;
mod workflow;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use config::{ConfigOverrides, GuardianConfig};
use std::process;

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = ConfigOverrides {
        log_dir: cli.log_dir,
        python: cli.python,
        command_timeout_secs: cli.timeout,
    };
    let config = GuardianConfig::load(cli.config.as_deref(), overrides)
        .context("Failed to load configuration")?;
    log::debug!("Using configuration: {config:?}");

    match cli.command {
        Commands::Upgrade => workflow::execute_upgrade(&config)?,
        Commands::Check => workflow::execute_check(&config)?,
        Commands::Snapshot => workflow::execute_snapshot(&config)?,
    }
    Ok(())
}
