//! PostgreSQL target store
//!
//! Implements [`TargetStore`] on top of [`PostgresClient`]. Project data
//! lands in a per-project schema; run records land in the `capmirror`
//! control schema. Batches insert inside a single transaction so a failed
//! flush leaves the destination exactly as the previous flush left it.

use crate::adapters::database::traits::TargetStore;
use crate::adapters::postgresql::client::PostgresClient;
use crate::adapters::postgresql::models::{cell_param, run_record_from_row};
use crate::core::runlog::{RunCompletion, RunDirection, RunRecord, RunStatus};
use crate::core::schema::tables::{
    quote_ident, EVENT_FK_COLUMN, REPEAT_INSTANCE_COLUMN, ROOT_FK_COLUMN,
};
use crate::core::schema::ProjectSchema;
use crate::domain::ids::ProjectName;
use crate::domain::rows::{
    EventBatch, InstrumentTableBatch, LookupTableBatch, RootBatch, RowBatch, RowOwner,
};
use crate::domain::{MirrorError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use tokio_postgres::Transaction;

/// DDL for the control schema and run-log table
const RUN_LOG_MIGRATION: &str = include_str!("../../../migrations/001_run_log.sql");

/// PostgreSQL implementation of [`TargetStore`]
pub struct PostgresStore {
    client: Arc<PostgresClient>,
}

impl PostgresStore {
    /// Create a new store around a client
    pub fn new(client: PostgresClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Create a new store around a shared client
    pub fn new_with_arc(client: Arc<PostgresClient>) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgresClient> {
        &self.client
    }
}

#[async_trait]
impl TargetStore for PostgresStore {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_run_log(&self) -> Result<()> {
        self.client.batch_execute(RUN_LOG_MIGRATION).await?;
        tracing::debug!("Run log storage ready");
        Ok(())
    }

    async fn reset_namespace(&self, namespace: &ProjectName) -> Result<()> {
        let conn = self.client.get_connection().await?;
        let ns = quote_ident(namespace.as_str());

        conn.batch_execute(&format!("DROP SCHEMA IF EXISTS {ns} CASCADE"))
            .await
            .map_err(|e| {
                MirrorError::SchemaMaterialization(format!(
                    "Failed to drop schema '{}': {e}",
                    namespace.as_str()
                ))
            })?;
        conn.batch_execute(&format!("CREATE SCHEMA {ns}"))
            .await
            .map_err(|e| {
                MirrorError::SchemaMaterialization(format!(
                    "Failed to create schema '{}': {e}",
                    namespace.as_str()
                ))
            })?;

        tracing::info!(namespace = %namespace.as_str(), "Namespace reset");
        Ok(())
    }

    async fn apply_schema(&self, schema: &ProjectSchema) -> Result<()> {
        let conn = self.client.get_connection().await?;

        for table in &schema.tables {
            let sql = table.create_sql(schema.namespace.as_str());
            conn.batch_execute(&sql).await.map_err(|e| {
                MirrorError::SchemaMaterialization(format!(
                    "Failed to create table '{}': {e}",
                    table.name
                ))
            })?;
            tracing::debug!(table = %table.name, "Created table");
        }

        tracing::info!(
            namespace = %schema.namespace.as_str(),
            tables = schema.tables.len(),
            "Schema applied"
        );
        Ok(())
    }

    async fn insert_batch(&self, batch: &RowBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut conn = self.client.get_connection().await?;
        let client = &mut **conn;
        let tx = client
            .transaction()
            .await
            .map_err(|e| MirrorError::BulkFlush(format!("Failed to begin transaction: {e}")))?;

        tx.batch_execute(&format!(
            "SET LOCAL statement_timeout = {}",
            self.client.statement_timeout_millis()
        ))
        .await
        .map_err(|e| MirrorError::BulkFlush(format!("Failed to set statement timeout: {e}")))?;

        let ns = batch.namespace.as_str();
        let mut written = 0;
        written += insert_root_rows(&tx, ns, &batch.roots).await?;
        written += insert_event_rows(&tx, ns, &batch.events).await?;
        for table in &batch.instruments {
            written += insert_instrument_rows(&tx, ns, table).await?;
        }
        for table in &batch.lookups {
            written += insert_lookup_rows(&tx, ns, table).await?;
        }

        tx.commit()
            .await
            .map_err(|e| MirrorError::BulkFlush(format!("Failed to commit batch: {e}")))?;

        tracing::debug!(namespace = %ns, rows = written, "Batch committed");
        Ok(written)
    }

    async fn start_run(&self, project: &str, direction: RunDirection) -> Result<i64> {
        let status = match direction {
            RunDirection::Download => RunStatus::EtlStarted,
            RunDirection::Upload => RunStatus::UploadStarted,
        };

        let row = self
            .client
            .query_one(
                "INSERT INTO capmirror.etl_runs (project, direction, status, started_at) \
                 VALUES ($1, $2, $3, $4) RETURNING id",
                &[&project, &direction.as_str(), &status.as_str(), &Utc::now()],
            )
            .await?;
        let id: i64 = row.get(0);

        tracing::debug!(run_id = id, project, direction = %direction, "Run record opened");
        Ok(id)
    }

    async fn finish_run(&self, run_id: i64, completion: &RunCompletion) -> Result<()> {
        let updated = self
            .client
            .execute(
                "UPDATE capmirror.etl_runs SET status = $2, ended_at = $3, query_count = $4, \
                 instruments_loaded = $5, comment = $6 WHERE id = $1",
                &[
                    &run_id,
                    &completion.status.as_str(),
                    &completion.ended_at,
                    &completion.query_count,
                    &completion.instruments_loaded,
                    &completion.comment,
                ],
            )
            .await?;

        if updated == 0 {
            return Err(MirrorError::Database(format!(
                "no run record with id {run_id}"
            )));
        }
        Ok(())
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<RunRecord>> {
        let rows = self
            .client
            .query(
                "SELECT id, project, direction, status, started_at, ended_at, query_count, \
                 instruments_loaded, comment FROM capmirror.etl_runs \
                 ORDER BY started_at DESC, id DESC LIMIT $1",
                &[&limit],
            )
            .await?;

        rows.iter().map(run_record_from_row).collect()
    }
}

fn flush_error(table: &str, e: tokio_postgres::Error) -> MirrorError {
    MirrorError::BulkFlush(format!("Insert into '{table}' failed: {e}"))
}

async fn insert_root_rows(
    tx: &Transaction<'_>,
    namespace: &str,
    batch: &RootBatch,
) -> Result<usize> {
    if batch.rows.is_empty() {
        return Ok(0);
    }

    let statement = format!(
        "INSERT INTO {}.{} ({}) VALUES ($1)",
        quote_ident(namespace),
        quote_ident(&batch.table),
        quote_ident(&batch.key_column)
    );
    for row in &batch.rows {
        let key = row.subject.as_str();
        tx.execute(&statement, &[&key])
            .await
            .map_err(|e| flush_error(&batch.table, e))?;
    }
    Ok(batch.rows.len())
}

async fn insert_event_rows(
    tx: &Transaction<'_>,
    namespace: &str,
    batch: &EventBatch,
) -> Result<usize> {
    if batch.rows.is_empty() {
        return Ok(0);
    }

    let statement = format!(
        "INSERT INTO {}.{} (\"id\", {}, \"event_unique_name\", \"event_label\", \"arm_number\", {}) \
         VALUES ($1, $2, $3, $4, $5, $6)",
        quote_ident(namespace),
        quote_ident(&batch.table),
        quote_ident(ROOT_FK_COLUMN),
        quote_ident(REPEAT_INSTANCE_COLUMN)
    );
    for row in &batch.rows {
        let subject = row.subject.as_str();
        tx.execute(
            &statement,
            &[
                &row.id,
                &subject,
                &row.event_unique_name,
                &row.event_label,
                &row.arm_number,
                &row.repeat_instance,
            ],
        )
        .await
        .map_err(|e| flush_error(&batch.table, e))?;
    }
    Ok(batch.rows.len())
}

async fn insert_instrument_rows(
    tx: &Transaction<'_>,
    namespace: &str,
    batch: &InstrumentTableBatch,
) -> Result<usize> {
    for row in &batch.rows {
        let mut columns = vec![quote_ident("id")];
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&row.id];

        let subject_key: &str;
        match &row.owner {
            RowOwner::Root(subject) => {
                subject_key = subject.as_str();
                columns.push(quote_ident(ROOT_FK_COLUMN));
                params.push(&subject_key);
            }
            RowOwner::Event(event_id) => {
                columns.push(quote_ident(EVENT_FK_COLUMN));
                params.push(event_id);
            }
        }

        columns.push(quote_ident(REPEAT_INSTANCE_COLUMN));
        params.push(&row.repeat_instance);

        for (column, value) in &row.values {
            columns.push(quote_ident(column));
            params.push(cell_param(value));
        }

        let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("${i}")).collect();
        let statement = format!(
            "INSERT INTO {}.{} ({}) VALUES ({})",
            quote_ident(namespace),
            quote_ident(&batch.table),
            columns.join(", "),
            placeholders.join(", ")
        );
        tx.execute(&statement, &params)
            .await
            .map_err(|e| flush_error(&batch.table, e))?;
    }
    Ok(batch.rows.len())
}

async fn insert_lookup_rows(
    tx: &Transaction<'_>,
    namespace: &str,
    batch: &LookupTableBatch,
) -> Result<usize> {
    if batch.rows.is_empty() {
        return Ok(0);
    }

    let statement = format!(
        "INSERT INTO {}.{} (\"id\", {}, {}, {}) VALUES ($1, $2, $3, $4)",
        quote_ident(namespace),
        quote_ident(&batch.table),
        quote_ident(&batch.fk_column),
        quote_ident(&batch.value_column),
        quote_ident(&batch.display_column)
    );
    for row in &batch.rows {
        tx.execute(
            &statement,
            &[&row.id, &row.instrument_id, &row.option_key, &row.display_value],
        )
        .await
        .map_err(|e| flush_error(&batch.table, e))?;
    }
    Ok(batch.rows.len())
}
