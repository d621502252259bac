// Capmirror - REDCap to PostgreSQL ETL Tool
// Copyright (c) 2025 Capmirror Contributors
// Licensed under the MIT License

use capmirror::cli::{Cli, Commands};
use capmirror::config::load_config;
use capmirror::logging::init_logging;
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    // This is optional - if .env doesn't exist, it's silently ignored
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Commands reload and report configuration errors themselves; this
    // early load only feeds the logging setup.
    let preload = load_config(&cli.config).ok();

    let log_level = match (&cli.log_level, &preload) {
        (Some(level), _) => level.clone(),
        (None, Some(config)) => config.application.log_level.clone(),
        (None, None) => "info".to_string(),
    };
    let logging_config = preload.map(|c| c.logging).unwrap_or_default();

    let logging_guard = match init_logging(&log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Capmirror - REDCap to PostgreSQL ETL Tool"
    );

    // Execute command and get exit code
    let exit_code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            5 // Fatal error exit code
        }
    };

    // The file appender buffers in a worker thread; dropping the guard
    // flushes it before the hard exit.
    drop(logging_guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Discover(args) => args.execute(&cli.config).await,
        Commands::Load(args) => args.execute(&cli.config).await,
        Commands::Upload(args) => args.execute(&cli.config).await,
        Commands::Status(args) => args.execute(&cli.config).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Init(args) => args.execute().await,
    }
}
