//! Status command implementation
//!
//! This module implements the `status` command for displaying recent run
//! history from the control table.

use crate::adapters::database::create_target_store;
use crate::config::load_config;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of runs to display
    #[arg(short, long, default_value_t = 10)]
    pub limit: i64,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(limit = self.limit, "Checking run history");

        println!("📊 Run History");
        println!();

        // Load configuration
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        // Create target store and verify the destination is reachable
        let store = match create_target_store(&config) {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to create target store");
                println!("   Error: {e}");
                return Ok(4); // Connection error exit code
            }
        };

        if let Err(e) = store.test_connection().await {
            println!("❌ Failed to connect to PostgreSQL");
            println!("   Error: {e}");
            return Ok(4);
        }

        // Load recent runs, newest first
        let runs = match store.recent_runs(self.limit).await {
            Ok(r) => r,
            Err(e) => {
                println!("❌ Failed to load run history");
                println!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        if runs.is_empty() {
            println!("No run history found.");
            println!("Run 'capmirror load' to mirror a project.");
            return Ok(0);
        }

        // Display runs in table format
        println!("Found {} run(s):", runs.len());
        println!();
        println!(
            "{:<6} {:<20} {:<10} {:<16} {:<20} {:<10} {:<8} {:<12}",
            "Id", "Project", "Direction", "Status", "Started", "Duration", "Queries", "Instruments"
        );
        println!("{}", "-".repeat(110));

        for run in &runs {
            let started = run.started_at.format("%Y-%m-%d %H:%M:%S").to_string();
            let duration = match run.duration() {
                Some(d) => format!("{}s", d.num_seconds()),
                None => "open".to_string(),
            };
            let queries = run
                .query_count
                .map(|q| q.to_string())
                .unwrap_or_else(|| "-".to_string());

            println!(
                "{:<6} {:<20} {:<10} {:<16} {:<20} {:<10} {:<8} {:<12}",
                run.id,
                run.project,
                run.direction,
                run.status,
                started,
                duration,
                queries,
                run.loaded_summary()
            );
        }

        println!();
        Ok(0)
    }
}
