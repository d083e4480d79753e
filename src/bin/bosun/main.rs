//! Bosun CLI - run batches of commands with cancel-aware parallelism

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("bosun=debug")
    } else {
        EnvFilter::new("bosun=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.verbose),
        Commands::Check(args) => commands::check::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
