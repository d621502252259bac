//! Database abstraction traits
//!
//! This module defines the trait that target stores must implement to
//! receive mirrored project data and run records.

use crate::core::runlog::{RunCompletion, RunDirection, RunRecord};
use crate::core::schema::ProjectSchema;
use crate::domain::ids::ProjectName;
use crate::domain::rows::RowBatch;
use crate::domain::Result;
use async_trait::async_trait;

/// Destination for mirrored project data
///
/// Implementations cover one destination kind each: PostgreSQL for
/// production, an in-memory store for tests. The load pipeline and the
/// CLI only ever see this trait.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Test the destination connection
    ///
    /// # Errors
    ///
    /// Returns an error if the destination is unreachable.
    async fn test_connection(&self) -> Result<()>;

    /// Create the control schema and run-log table if they do not exist
    ///
    /// Idempotent; called before any run record is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the control objects cannot be created.
    async fn ensure_run_log(&self) -> Result<()>;

    /// Drop and recreate the project namespace
    ///
    /// Destroys every table in the namespace. Loads are full-refresh:
    /// reset always precedes [`TargetStore::apply_schema`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::MirrorError::SchemaMaterialization`] when
    /// the namespace cannot be dropped or recreated.
    async fn reset_namespace(&self, namespace: &ProjectName) -> Result<()>;

    /// Create every table of the generated schema, in dependency order
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::MirrorError::SchemaMaterialization`] on the
    /// first failed statement; nothing after it is attempted.
    async fn apply_schema(&self, schema: &ProjectSchema) -> Result<()>;

    /// Insert one batch of rows atomically
    ///
    /// The whole batch commits or none of it does; previously committed
    /// batches are unaffected either way.
    ///
    /// # Returns
    ///
    /// The number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::MirrorError::BulkFlush`] when any part of
    /// the batch fails to insert.
    async fn insert_batch(&self, batch: &RowBatch) -> Result<usize>;

    /// Open a run record and return its id
    ///
    /// The record starts in the direction's started status and stays there
    /// until [`TargetStore::finish_run`] applies a terminal status.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    async fn start_run(&self, project: &str, direction: RunDirection) -> Result<i64>;

    /// Finalize an open run record
    ///
    /// # Errors
    ///
    /// Returns an error if no run record has the id or the update fails.
    async fn finish_run(&self, run_id: i64, completion: &RunCompletion) -> Result<()>;

    /// Most recent run records, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn recent_runs(&self, limit: i64) -> Result<Vec<RunRecord>>;
}
