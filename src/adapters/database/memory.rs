//! In-memory target store
//!
//! [`MemoryStore`] keeps all data in process memory behind a mutex. It
//! exists for integration tests and development: pipelines run against it
//! exactly as against PostgreSQL, and tests inspect the captured rows
//! afterwards. Everything is lost when the process ends.

use crate::adapters::database::traits::TargetStore;
use crate::core::runlog::{RunCompletion, RunDirection, RunRecord, RunStatus};
use crate::core::schema::ProjectSchema;
use crate::domain::ids::ProjectName;
use crate::domain::rows::{EventRow, InstrumentRow, LookupRow, RootRow, RowBatch};
use crate::domain::{MirrorError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One captured row, tagged by table kind
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRow {
    Root(RootRow),
    Event(EventRow),
    Instrument(InstrumentRow),
    Lookup(LookupRow),
}

#[derive(Debug, Default)]
struct Inner {
    /// namespace → table → rows; a table exists once the schema created it
    namespaces: HashMap<String, BTreeMap<String, Vec<StoredRow>>>,
    runs: Vec<RunRecord>,
    next_run_id: i64,
}

/// In-memory [`TargetStore`] for tests and development
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                namespaces: HashMap::new(),
                runs: Vec::new(),
                next_run_id: 1,
            })),
        }
    }

    /// Table names currently existing in a namespace
    pub async fn tables(&self, namespace: &str) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .namespaces
            .get(namespace)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// A copy of one table's rows
    pub async fn table_rows(&self, namespace: &str, table: &str) -> Vec<StoredRow> {
        let inner = self.inner.lock().await;
        inner
            .namespaces
            .get(namespace)
            .and_then(|tables| tables.get(table))
            .cloned()
            .unwrap_or_default()
    }

    /// Total rows stored in a namespace
    pub async fn row_count(&self, namespace: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .namespaces
            .get(namespace)
            .map(|tables| tables.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// A copy of all run records, in insertion order
    pub async fn runs(&self) -> Vec<RunRecord> {
        let inner = self.inner.lock().await;
        inner.runs.clone()
    }

    /// Drop everything, including run records
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.namespaces.clear();
        inner.runs.clear();
        inner.next_run_id = 1;
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_run_log(&self) -> Result<()> {
        Ok(())
    }

    async fn reset_namespace(&self, namespace: &ProjectName) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .namespaces
            .insert(namespace.as_str().to_string(), BTreeMap::new());
        Ok(())
    }

    async fn apply_schema(&self, schema: &ProjectSchema) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let tables = inner
            .namespaces
            .entry(schema.namespace.as_str().to_string())
            .or_default();
        for table in &schema.tables {
            tables.entry(table.name.clone()).or_default();
        }
        Ok(())
    }

    async fn insert_batch(&self, batch: &RowBatch) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let tables = inner
            .namespaces
            .get_mut(batch.namespace.as_str())
            .ok_or_else(|| {
                MirrorError::BulkFlush(format!(
                    "namespace '{}' does not exist",
                    batch.namespace.as_str()
                ))
            })?;

        // Validate every target table before touching any rows so a bad
        // batch leaves the store unmodified.
        let mut targets: Vec<&str> = Vec::new();
        if !batch.roots.rows.is_empty() {
            targets.push(&batch.roots.table);
        }
        if !batch.events.rows.is_empty() {
            targets.push(&batch.events.table);
        }
        for table in &batch.instruments {
            targets.push(&table.table);
        }
        for table in &batch.lookups {
            targets.push(&table.table);
        }
        for target in &targets {
            if !tables.contains_key(*target) {
                return Err(MirrorError::BulkFlush(format!(
                    "table '{target}' does not exist in namespace '{}'",
                    batch.namespace.as_str()
                )));
            }
        }

        let mut written = 0;
        if !batch.roots.rows.is_empty() {
            let rows = tables.entry(batch.roots.table.clone()).or_default();
            for row in &batch.roots.rows {
                rows.push(StoredRow::Root(row.clone()));
                written += 1;
            }
        }
        if !batch.events.rows.is_empty() {
            let rows = tables.entry(batch.events.table.clone()).or_default();
            for row in &batch.events.rows {
                rows.push(StoredRow::Event(row.clone()));
                written += 1;
            }
        }
        for table in &batch.instruments {
            let rows = tables.entry(table.table.clone()).or_default();
            for row in &table.rows {
                rows.push(StoredRow::Instrument(row.clone()));
                written += 1;
            }
        }
        for table in &batch.lookups {
            let rows = tables.entry(table.table.clone()).or_default();
            for row in &table.rows {
                rows.push(StoredRow::Lookup(row.clone()));
                written += 1;
            }
        }
        Ok(written)
    }

    async fn start_run(&self, project: &str, direction: RunDirection) -> Result<i64> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_run_id;
        inner.next_run_id += 1;
        let status = match direction {
            RunDirection::Download => RunStatus::EtlStarted,
            RunDirection::Upload => RunStatus::UploadStarted,
        };
        inner.runs.push(RunRecord {
            id,
            project: project.to_string(),
            direction,
            status,
            started_at: Utc::now(),
            ended_at: None,
            query_count: None,
            instruments_loaded: None,
            comment: None,
        });
        Ok(id)
    }

    async fn finish_run(&self, run_id: i64, completion: &RunCompletion) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let run = inner
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| MirrorError::Database(format!("no run record with id {run_id}")))?;
        run.status = completion.status;
        run.ended_at = Some(completion.ended_at);
        run.query_count = Some(completion.query_count);
        run.instruments_loaded = completion.instruments_loaded.clone();
        run.comment = completion.comment.clone();
        Ok(())
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<RunRecord>> {
        let inner = self.inner.lock().await;
        let mut runs = inner.runs.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        runs.truncate(limit.max(0) as usize);
        Ok(runs)
    }
}
