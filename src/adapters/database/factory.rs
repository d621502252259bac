//! Target store factory
//!
//! Builds the production store from configuration. PostgreSQL is the only
//! production target; tests construct
//! [`crate::adapters::database::memory::MemoryStore`] directly.

use crate::adapters::database::traits::TargetStore;
use crate::adapters::postgresql::{PostgresClient, PostgresStore};
use crate::config::schema::MirrorConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the target store for a configuration
///
/// # Arguments
///
/// * `config` - The mirror configuration
///
/// # Returns
///
/// Returns an Arc-wrapped trait object that implements [`TargetStore`]
///
/// # Errors
///
/// Returns an error if the store cannot be created from the configured
/// connection settings.
pub fn create_target_store(config: &MirrorConfig) -> Result<Arc<dyn TargetStore>> {
    tracing::info!("Creating PostgreSQL target store");
    let client = PostgresClient::new(config.postgres.clone())?;
    tracing::debug!(destination = %client.connection_string_safe(), "Target store configured");

    Ok(Arc::new(PostgresStore::new(client)))
}
