//! Ignite CLI - run health probes and inspect configuration without starting a host.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{check, config};
use output::OutputFormat;

/// Ignite - Startup Orchestration and Health Admission
#[derive(Parser)]
#[command(
    name = "ignite",
    author = "Aezi <aezi.zhu@icloud.com>",
    version = "0.1.0",
    about = "Ignite - Startup Orchestration and Health Admission",
    long_about = "Runs configured health probes through the admission gate and inspects Ignite configuration.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Configuration file
    #[arg(short, long, global = true, env = "IGNITE_CONFIG")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured health probes and evaluate admission
    Check(check::CheckArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let format = cli.output;
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Check(args) => check::execute(args, config_path, format).await,
        Commands::Config(cmd) => config::execute(cmd, config_path, format),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
