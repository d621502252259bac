//! Core business logic for capmirror.
//!
//! This module contains the core business logic and orchestration for
//! mirroring a REDCap project into PostgreSQL.
//!
//! # Modules
//!
//! - [`discover`] - Metadata discovery against the REDCap API
//! - [`dictionary`] - Project dictionary persistence between commands
//! - [`schema`] - Relational schema generation from the metadata model
//! - [`transform`] - Record transformation into typed rows
//! - [`load`] - Load orchestration, bulk queueing, and coordination
//! - [`upload`] - The reverse direction, pushing edited records back
//! - [`runlog`] - Run-log records shared by both directions
//!
//! # Load Workflow
//!
//! The typical load workflow:
//!
//! 1. **Load Dictionary**: Read the discovered metadata model from disk
//! 2. **Reset Schema**: Drop and rebuild the project namespace
//! 3. **Fetch Subjects**: Export the deduplicated subject list
//! 4. **Transform**: Convert each subject's records into typed rows
//! 5. **Flush**: Insert each subject's rows as one atomic batch
//! 6. **Report**: Finalize the run record and generate a load summary
//!
//! # Example
//!
//! ```rust,no_run
//! use capmirror::adapters::database::create_target_store;
//! use capmirror::adapters::redcap::RedcapClient;
//! use capmirror::config::MirrorConfig;
//! use capmirror::core::dictionary::ProjectDictionary;
//! use capmirror::core::load::LoadCoordinator;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration and the discovered metadata model
//! let config = MirrorConfig::from_file("capmirror.toml")?;
//! let dictionary = ProjectDictionary::load(&config.project.dictionary_path)?;
//!
//! // Create the API client and the target store
//! let client = Arc::new(RedcapClient::new(&config.redcap)?);
//! let store = create_target_store(&config)?;
//!
//! // Execute the load
//! let coordinator = LoadCoordinator::new(
//!     dictionary.project,
//!     config.project.include_instruments.clone(),
//!     client,
//!     store,
//! );
//! let summary = coordinator.execute_load().await?;
//!
//! println!("Subjects: {}", summary.subjects_loaded);
//! println!("Rows written: {}", summary.rows_written);
//! # Ok(())
//! # }
//! ```

pub mod dictionary;
pub mod discover;
pub mod load;
pub mod runlog;
pub mod schema;
pub mod transform;
pub mod upload;
