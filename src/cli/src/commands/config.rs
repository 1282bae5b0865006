//! Configuration inspection commands.
//!
//! The file is resolved from `--config`, then `./ignite.toml`, then
//! `<config dir>/ignite/ignite.toml`. `IGNITE__*` environment variables are
//! layered on top as they are for the host.

use anyhow::{Context, Result};
use clap::Subcommand;
use ignite_core::config::Config;
use std::path::{Path, PathBuf};

use crate::output::{self, OutputFormat};

const FILE_NAME: &str = "ignite.toml";

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Load and validate the configuration
    Validate,

    /// Print which configuration file would be used
    Path,
}

/// Locate the configuration file, if any.
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("ignite").join(FILE_NAME))
        .filter(|path| path.exists())
}

/// Load the effective configuration.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    match resolve_path(explicit) {
        Some(path) => Config::from_file(&path.to_string_lossy())
            .with_context(|| format!("Failed to load {}", path.display())),
        None => Config::load().context("Failed to load configuration"),
    }
}

pub fn execute(cmd: ConfigCommands, explicit: Option<&Path>, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = load(explicit)?;
            match format {
                OutputFormat::Table => {
                    let rendered =
                        toml::to_string_pretty(&config).context("Failed to render configuration")?;
                    output::print_header("Effective Configuration");
                    print!("{}", rendered);
                }
                _ => output::print_item(&config, format)?,
            }
        }

        ConfigCommands::Validate => {
            let config = load(explicit)?;
            match format {
                OutputFormat::Table => {
                    let source = resolve_path(explicit)
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "defaults".to_string());
                    output::print_success(&format!("Configuration is valid ({})", source));
                    output::print_detail("Environment", config.environment.as_str());
                    output::print_detail("Probes", &config.health.probes.len().to_string());
                    output::print_detail("Max retries", &config.health.max_retries.to_string());
                    output::print_detail(
                        "Max failure rate",
                        &format!("{:.0}%", config.health.max_failure_rate * 100.0),
                    );
                    if !config.health.critical_services.is_empty() {
                        let critical: Vec<&str> =
                            config.health.critical_services.iter().map(String::as_str).collect();
                        output::print_detail("Critical services", &critical.join(", "));
                    }
                }
                _ => output::print_item(
                    &serde_json::json!({
                        "valid": true,
                        "environment": config.environment,
                        "probes": config.health.probes.len(),
                    }),
                    format,
                )?,
            }
        }

        ConfigCommands::Path => match resolve_path(explicit) {
            Some(path) => println!("{}", path.display()),
            None => output::print_info(
                "No configuration file found; using defaults and IGNITE__* environment variables.",
            ),
        },
    }

    Ok(())
}
