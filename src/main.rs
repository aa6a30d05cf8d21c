//! Main entry point for the locdb CLI tool

use anyhow::Context;
use clap::Parser;
use locdb_rs::cli::Cli;
use locdb_rs::config::AppConfig;
use log::info;

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration; its `global.verbose` counts as much as --verbose
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}, using defaults", e);
        AppConfig::default()
    });

    // Initialize logging; RUST_LOG still wins over both
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level(&config))).init();

    info!("Starting locdb v{}", env!("CARGO_PKG_VERSION"));

    cli.run(config).context("locdb failed")?;

    Ok(())
}
