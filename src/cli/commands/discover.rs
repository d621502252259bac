//! Discover command implementation
//!
//! This module implements the `discover` command for reading project
//! structure from REDCap and writing the project dictionary file.

use crate::adapters::redcap::RedcapClient;
use crate::config::load_config;
use crate::core::dictionary::ProjectDictionary;
use crate::core::discover::MetadataDiscovery;
use crate::domain::ProjectName;
use clap::Args;

/// Arguments for the discover command
#[derive(Args, Debug)]
pub struct DiscoverArgs {}

impl DiscoverArgs {
    /// Execute the discover command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting discover command");

        // Load configuration
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let project_name = match ProjectName::new(&config.project.name) {
            Ok(name) => name,
            Err(e) => {
                println!("❌ Invalid project name: {}", config.project.name);
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        // Create REDCap client
        let client = match RedcapClient::new(&config.redcap) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to create REDCap client");
                println!("   Error: {e}");
                return Ok(4); // Connection error exit code
            }
        };

        println!("🔍 Discovering project structure from REDCap...");
        println!();

        let discovery = MetadataDiscovery::new(&client, project_name);
        let dictionary = match discovery.discover().await {
            Ok(project) => ProjectDictionary::new(project),
            Err(e) => {
                println!("❌ Discovery failed");
                println!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        if let Err(e) = dictionary.save(&config.project.dictionary_path) {
            println!("❌ Failed to write dictionary file");
            println!("   Error: {e}");
            return Ok(5);
        }

        let project = &dictionary.project;
        let field_count: usize = project.instruments.iter().map(|i| i.fields.len()).sum();

        println!("📊 Project Structure:");
        println!("  Title: {}", project.title);
        println!("  Primary Key: {}", project.primary_key_field);
        println!(
            "  Longitudinal: {}",
            if project.longitudinal { "yes" } else { "no" }
        );
        println!("  Arms: {}", project.arms.len());
        println!("  Events: {}", project.events.len());
        println!("  Instruments: {}", project.instruments.len());
        println!("  Fields: {}", field_count);
        println!();
        println!("✅ Dictionary written to {}", config.project.dictionary_path);
        println!();
        println!("Review the dictionary file, then run 'capmirror load' to mirror the data.");

        Ok(0)
    }
}
