//! Operator CLI for trustwalk
//!
//! Builds the project delegation layout from a simple index directory and
//! resolves targets against the published documents.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

use commands::{build::BuildArgs, resolve::ResolveArgs};

#[derive(Parser)]
#[command(name = "trustwalk")]
#[command(about = "Delegated targets metadata builder and preorder resolver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "trustwalk.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Split projects, build the delegation layout and publish every document
    Build(BuildArgs),

    /// Find the role authoritative for a target
    Resolve(ResolveArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = commands::load_config(&cli.config)?;
    match cli.command {
        Commands::Build(args) => commands::build::run(args, config),
        Commands::Resolve(args) => commands::resolve::run(args, config),
    }
}
