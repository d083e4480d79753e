//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Bosun - a cancelable parallel job runner for build-style tasks
#[derive(Parser)]
#[command(name = "bosun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every step of a job plan
    Run(RunArgs),

    /// Validate a job plan and resolve its programs on PATH
    Check(CheckArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the job plan TOML file
    pub plan: PathBuf,

    /// Number of parallel workers (overrides the plan)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Cancel remaining steps as soon as one fails (overrides the plan)
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Path to the job plan TOML file
    pub plan: PathBuf,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
