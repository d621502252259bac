//! Load command implementation
//!
//! This module implements the `load` command for mirroring a REDCap
//! project into PostgreSQL.

use crate::adapters::database::create_target_store;
use crate::adapters::redcap::RedcapClient;
use crate::config::load_config;
use crate::core::dictionary::ProjectDictionary;
use crate::core::load::LoadCoordinator;
use clap::Args;
use std::sync::Arc;

/// Arguments for the load command
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl LoadArgs {
    /// Execute the load command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting load command");

        // Load configuration
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        // Load the project dictionary written by `discover`
        let dictionary = match ProjectDictionary::load(&config.project.dictionary_path) {
            Ok(d) => d,
            Err(e) => {
                println!(
                    "❌ Failed to load dictionary file: {}",
                    config.project.dictionary_path
                );
                println!("   Error: {e}");
                println!("   Run 'capmirror discover' to generate it.");
                return Ok(2);
            }
        };

        // Confirmation prompt (unless --yes). A load drops and rebuilds the
        // project namespace before any record lands.
        if !self.yes {
            println!("Load Configuration:");
            println!("  Project: {}", config.project.name);
            println!("  Title: {}", dictionary.project.title);
            println!(
                "  Instruments: {}",
                if config.project.include_instruments.is_empty() {
                    "all".to_string()
                } else {
                    config.project.include_instruments.join(", ")
                }
            );
            println!();
            println!(
                "⚠️  This drops and rebuilds the '{}' schema in PostgreSQL.",
                config.project.name
            );
            print!("Proceed with load? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Load cancelled.");
                return Ok(0);
            }
        }

        // Create REDCap client
        let client = match RedcapClient::new(&config.redcap) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                println!("❌ Failed to create REDCap client");
                println!("   Error: {e}");
                return Ok(4); // Connection error exit code
            }
        };

        // Create target store and verify the destination is reachable
        let store = match create_target_store(&config) {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to create target store");
                println!("   Error: {e}");
                return Ok(4);
            }
        };

        if let Err(e) = store.test_connection().await {
            println!("❌ Failed to connect to PostgreSQL");
            println!("   Error: {e}");
            return Ok(4);
        }

        println!("🚀 Starting load...");
        println!();

        let coordinator = LoadCoordinator::new(
            dictionary.project,
            config.project.include_instruments.clone(),
            client,
            store,
        );

        let summary = match coordinator.execute_load().await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Load failed");
                println!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        // Display summary
        println!();
        println!("📊 Load Summary:");
        println!("  Project: {}", summary.project);
        println!("  Run Id: {}", summary.run_id);
        println!("  Subjects: {}", summary.subjects_loaded);
        println!("  Records: {}", summary.records_processed);
        println!("  Rows Written: {}", summary.rows_written);
        println!("  API Queries: {}", summary.query_count);
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!();

        if summary.is_clean() {
            println!("✅ Load completed successfully!");
            Ok(0)
        } else {
            println!(
                "⚠️  Load completed with {} recovered field warning(s):",
                summary.warnings.len()
            );
            for warning in summary.warnings.iter().take(10) {
                println!("  - {warning}");
            }
            if summary.warnings.len() > 10 {
                println!("  ... and {} more", summary.warnings.len() - 10);
            }
            Ok(1) // Partial success
        }
    }
}
