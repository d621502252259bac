//! PostgreSQL target integration
//!
//! This module provides the production [`crate::adapters::database::traits::TargetStore`]
//! implementation: mirrored project tables plus the run log, stored in
//! PostgreSQL.

pub mod client;
pub mod models;
pub mod store;

pub use client::PostgresClient;
pub use store::PostgresStore;
