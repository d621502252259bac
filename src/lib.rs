// Capmirror - REDCap to PostgreSQL ETL Tool
// Copyright (c) 2025 Capmirror Contributors
// Licensed under the MIT License

//! # Capmirror - REDCap to PostgreSQL Mirroring
//!
//! Capmirror is an ETL tool built in Rust that mirrors REDCap projects into
//! PostgreSQL for reporting and analysis, and pushes prepared record sets
//! back into REDCap.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Discovering** project structure via the REDCap API and persisting it
//!   as a reviewable dictionary file
//! - **Materializing** a relational schema (one table per instrument, typed
//!   columns, display lookups) from the discovered structure
//! - **Loading** subject records subject-by-subject with typed coercion and
//!   atomic per-subject batches
//! - **Uploading** edited record sets from JSON files back into REDCap in
//!   batches
//!
//! ## Architecture
//!
//! Capmirror follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (discover, schema, transform, load, upload)
//! - [`adapters`] - External integrations (REDCap, PostgreSQL)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use capmirror::adapters::database::create_target_store;
//! use capmirror::adapters::redcap::RedcapClient;
//! use capmirror::config::MirrorConfig;
//! use capmirror::core::dictionary::ProjectDictionary;
//! use capmirror::core::load::LoadCoordinator;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load configuration and the discovered metadata model
//!     let config = MirrorConfig::from_file("capmirror.toml")?;
//!     let dictionary = ProjectDictionary::load(&config.project.dictionary_path)?;
//!
//!     // Create the API client and the target store
//!     let client = Arc::new(RedcapClient::new(&config.redcap)?);
//!     let store = create_target_store(&config)?;
//!
//!     // Execute the load
//!     let coordinator = LoadCoordinator::new(
//!         dictionary.project,
//!         config.project.include_instruments.clone(),
//!         client,
//!         store,
//!     );
//!     let summary = coordinator.execute_load().await?;
//!
//!     println!("Loaded {} rows for {}", summary.rows_written, summary.project);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Capmirror uses the [`domain::MirrorError`] type for all errors:
//!
//! ```rust,no_run
//! use capmirror::domain::MirrorError;
//!
//! fn example() -> Result<(), MirrorError> {
//!     // Errors are automatically converted using the ? operator
//!     let config = capmirror::config::MirrorConfig::from_file("capmirror.toml")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Capmirror uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(project = "cardiology_registry", "Starting load");
//! warn!(field = "visit_date", "Value not storable as date");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
