//! pkgen - generate typed prompt accessors
//!
//! CLI entry point.

use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::info;

use pkgen::cli::{Cli, Command};
use pkgen::run_generate;
use promptkit::{Config, GenerationScope, HttpRegistryClient};

fn setup_logging(level: &str) -> Result<()> {
    let level: tracing::Level = level.parse().map_err(|_| eyre!("Invalid log level '{}'", level))?;

    // stdout carries the summary, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = cli
        .log_level
        .as_deref()
        .or(config.log_level.as_deref())
        .unwrap_or("info");
    setup_logging(level).context("Failed to setup logging")?;

    match cli.command {
        Command::Generate {
            output_dir,
            prompts,
            base_url,
        } => cmd_generate(&config, output_dir, prompts, base_url).await,
    }
}

/// Fetch manifests and write generated modules
async fn cmd_generate(
    config: &Config,
    output_dir: Option<PathBuf>,
    prompts: Vec<String>,
    base_url: Option<String>,
) -> Result<()> {
    let mut registry_config = config.registry.clone();
    if let Some(base_url) = base_url {
        registry_config.base_url = base_url;
    }
    let registry = HttpRegistryClient::from_config(&registry_config).context("Failed to create registry client")?;

    let output_dir = output_dir.unwrap_or_else(|| config.generate.output_dir.clone());
    let ids = if prompts.is_empty() {
        config.generate.prompts.clone()
    } else {
        prompts
    };
    let scope = GenerationScope::from_ids(ids);
    info!(?scope, output_dir = %output_dir.display(), "Generating prompt modules");

    let summary = run_generate(&registry, &scope, &output_dir)
        .await
        .context("Generation failed")?;

    for path in &summary.written {
        println!("{} Wrote {}", "✓".green(), path.display());
    }
    for path in &summary.removed {
        println!("{} Removed {}", "✓".green(), path.display());
    }
    if !summary.unchanged.is_empty() {
        println!("{} {} file(s) unchanged", "·".dimmed(), summary.unchanged.len());
    }

    if !summary.is_ok() {
        for failure in &summary.failures {
            eprintln!("{} {}", "✗".red(), failure);
        }
        return Err(eyre!("{} prompt version(s) failed to generate", summary.failures.len()));
    }
    Ok(())
}
