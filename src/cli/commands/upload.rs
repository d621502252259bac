//! Upload command implementation
//!
//! This module implements the `upload` command for pushing a prepared
//! record set from a JSON file back into REDCap.

use crate::adapters::database::create_target_store;
use crate::adapters::redcap::RedcapClient;
use crate::config::load_config;
use crate::core::dictionary::ProjectDictionary;
use crate::core::upload::UploadCoordinator;
use clap::Args;
use std::path::Path;
use std::sync::Arc;

/// Arguments for the upload command
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Path to the JSON file of records to upload
    #[arg(short, long)]
    pub file: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl UploadArgs {
    /// Execute the upload command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(file = %self.file, "Starting upload command");

        // Load configuration
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        // The dictionary tells the upload which fields are dates
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

        // Confirmation prompt (unless --yes). Uploads modify records in the
        // REDCap project itself.
        if !self.yes {
            println!("Upload Configuration:");
            println!("  Project: {}", config.project.name);
            println!("  Source File: {}", self.file);
            println!("  Batch Size: {}", config.upload.batch_size);
            println!();
            print!("Proceed with upload? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Upload cancelled.");
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

        // Create target store and verify the run log is reachable
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

        println!("🚀 Starting upload...");
        println!();

        let coordinator = UploadCoordinator::new(
            dictionary.project,
            config.upload.batch_size,
            client,
            store,
        );

        let summary = match coordinator.execute_upload(Path::new(&self.file)).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Upload failed");
                println!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        // Display summary
        println!();
        println!("📊 Upload Summary:");
        println!("  Project: {}", summary.project);
        println!("  Run Id: {}", summary.run_id);
        println!("  Source File: {}", summary.source_file);
        println!("  Records Sent: {}", summary.records_sent);
        println!("  Batches: {}", summary.batches_sent);
        println!("  API Queries: {}", summary.query_count);
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!();
        println!("✅ Upload completed successfully!");

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_args_defaults() {
        let args = UploadArgs {
            file: "records.json".to_string(),
            yes: false,
        };

        assert_eq!(args.file, "records.json");
        assert!(!args.yes);
    }
}
