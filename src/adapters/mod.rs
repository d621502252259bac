//! External system integrations for Capmirror.
//!
//! This module provides adapters for the two systems a mirror run touches:
//!
//! - [`redcap`] - REDCap API client (records, metadata, uploads)
//! - [`database`] - Target store abstraction layer (trait-based)
//! - [`postgresql`] - PostgreSQL target store implementation
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies
//! and enable testing with mock implementations. The database layer uses
//! trait-based abstraction so the load pipeline never depends on a concrete
//! destination.
//!
//! # REDCap Adapter
//!
//! The REDCap client is constructed from configuration and issues
//! form-encoded API calls:
//!
//! ```rust,no_run
//! use capmirror::adapters::redcap::{RecordFilter, RedcapClient};
//! use capmirror::config::schema::RedcapConfig;
//! use capmirror::config::secret::secret_string;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RedcapConfig {
//!     api_url: "https://redcap.example.org/api/".to_string(),
//!     api_token: secret_string("0123456789ABCDEF0123456789ABCDEF".to_string()),
//!     timeout_seconds: 60,
//!     verify_ssl: true,
//! };
//!
//! let client = RedcapClient::new(&config)?;
//! let records = client.export_records(&RecordFilter::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Target Store
//!
//! Production runs write to PostgreSQL through the pooled client:
//!
//! ```rust,no_run
//! use capmirror::adapters::database::create_target_store;
//! use capmirror::config::MirrorConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MirrorConfig::from_file("capmirror.toml")?;
//! let store = create_target_store(&config)?;
//! store.test_connection().await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod postgresql;
pub mod redcap;
