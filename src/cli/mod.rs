//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for capmirror using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Capmirror - REDCap mirroring tool
#[derive(Parser, Debug)]
#[command(name = "capmirror")]
#[command(version, about, long_about = None)]
#[command(author = "Capmirror Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "capmirror.toml", env = "CAPMIRROR_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CAPMIRROR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read project structure from REDCap and write the dictionary file
    Discover(commands::discover::DiscoverArgs),

    /// Mirror the REDCap project into PostgreSQL (full refresh)
    Load(commands::load::LoadArgs),

    /// Push a JSON record set back into REDCap
    Upload(commands::upload::UploadArgs),

    /// Show recent run history
    Status(commands::status::StatusArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
