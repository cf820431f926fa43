use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pipguard",
    about = "Risk-tiered pip upgrades with snapshots and rollback scripts",
    version,
    author
)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/pipguard/config.toml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Python interpreter whose packages are managed
    #[arg(long, value_name = "EXE")]
    pub python: Option<String>,

    /// Directory for snapshots, rollback scripts and session logs
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Timeout in seconds for each pip invocation
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Review outdated packages by risk and upgrade a selection interactively
    Upgrade,

    /// Show outdated packages grouped by risk without changing anything
    Check,

    /// Save the installed package state to a requirements file
    Snapshot,
}
