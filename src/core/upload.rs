//! Upload coordinator - the reverse direction
//!
//! Pushes locally edited records back to REDCap. The input is a JSON
//! array of flat field:value records, typically exported from the mirror
//! and amended by hand. Records are normalized (nulls become empty
//! strings, date-typed values are reformatted to `%Y-%m-%d`) and posted
//! in batches with overwrite behavior.
//!
//! There is no partial-batch retry. A batch the API does not acknowledge
//! with a positive affected-subject count aborts the whole upload; the
//! run record then shows how far it got.

use crate::adapters::database::traits::TargetStore;
use crate::adapters::redcap::RedcapClient;
use crate::core::runlog::{RunCompletion, RunDirection, RunStatus};
use crate::core::transform::parse_lenient_date;
use crate::domain::metadata::{FieldType, ProjectMetadata};
use crate::domain::{MirrorError, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Summary of an upload operation
#[derive(Debug, Clone)]
pub struct UploadSummary {
    /// Project namespace the run uploaded from
    pub project: String,

    /// Run-log record id for this run
    pub run_id: i64,

    /// Name of the input file
    pub source_file: String,

    /// Number of records acknowledged by the API
    pub records_sent: usize,

    /// Number of batches acknowledged by the API
    pub batches_sent: usize,

    /// Number of API queries issued
    pub query_count: u64,

    /// Duration of the upload
    pub duration: Duration,
}

impl UploadSummary {
    /// Create a new empty upload summary
    pub fn new(project: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            run_id: 0,
            source_file: source_file.into(),
            records_sent: 0,
            batches_sent: 0,
            query_count: 0,
            duration: Duration::from_secs(0),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Run record comment: the input file and how much of it was sent
    pub fn comment(&self) -> String {
        format!(
            "Uploaded {} records from {}",
            self.records_sent, self.source_file
        )
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            project = %self.project,
            run_id = self.run_id,
            file = %self.source_file,
            records = self.records_sent,
            batches = self.batches_sent,
            queries = self.query_count,
            duration_secs = self.duration.as_secs(),
            "Upload completed"
        );
    }
}

/// Upload coordinator
pub struct UploadCoordinator {
    project: ProjectMetadata,
    batch_size: usize,
    client: Arc<RedcapClient>,
    store: Arc<dyn TargetStore>,
}

impl UploadCoordinator {
    /// Create a new upload coordinator
    pub fn new(
        project: ProjectMetadata,
        batch_size: usize,
        client: Arc<RedcapClient>,
        store: Arc<dyn TargetStore>,
    ) -> Self {
        Self {
            project,
            batch_size,
            client,
            store,
        }
    }

    /// Execute the upload
    ///
    /// Reads the input file, opens a run record, posts the records in
    /// batches, and finalizes the run record. Any fatal error finalizes
    /// the run record with a failed status and the error message as
    /// comment, then propagates.
    pub async fn execute_upload(&self, file: &Path) -> Result<UploadSummary> {
        let start = Instant::now();
        let records = read_upload_file(file)?;
        let mut summary = UploadSummary::new(self.project.name.as_str(), file_label(file));

        tracing::info!(
            project = %self.project.name.as_str(),
            file = %summary.source_file,
            records = records.len(),
            batch_size = self.batch_size,
            "Starting upload"
        );

        self.store.ensure_run_log().await?;
        let run_id = self
            .store
            .start_run(self.project.name.as_str(), RunDirection::Upload)
            .await?;
        summary.run_id = run_id;

        let outcome = self.send_all(&records, &mut summary).await;
        summary.query_count = self.client.query_count();

        match outcome {
            Ok(()) => {
                let completion =
                    RunCompletion::new(RunStatus::UploadComplete, summary.query_count as i32)
                        .with_comment(summary.comment());
                self.store.finish_run(run_id, &completion).await?;

                summary = summary.with_duration(start.elapsed());
                summary.log_summary();
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Upload failed");
                let completion =
                    RunCompletion::new(RunStatus::UploadFailed, summary.query_count as i32)
                        .with_comment(format!("{}\n{e}", summary.comment()));
                if let Err(log_err) = self.store.finish_run(run_id, &completion).await {
                    tracing::error!(
                        error = %log_err,
                        "Failed to finalize run record after upload failure"
                    );
                }
                Err(e)
            }
        }
    }

    async fn send_all(
        &self,
        records: &[Map<String, Value>],
        summary: &mut UploadSummary,
    ) -> Result<()> {
        let date_fields = date_field_names(&self.project);
        let mut pending: Vec<Value> = Vec::new();

        for record in records {
            pending.push(Value::Object(process_record(record, &date_fields)?));
            if pending.len() >= self.batch_size {
                self.send_batch(&mut pending, summary).await?;
            }
        }
        if !pending.is_empty() {
            self.send_batch(&mut pending, summary).await?;
        }
        Ok(())
    }

    /// Post one batch and drain the pending buffer
    ///
    /// The acknowledgment count is the number of subjects affected, not
    /// records sent, so anything positive is a success.
    async fn send_batch(
        &self,
        pending: &mut Vec<Value>,
        summary: &mut UploadSummary,
    ) -> Result<()> {
        let record_count = pending.len();
        let payload = Value::Array(std::mem::take(pending));
        let ack = self.client.import_records(&payload).await?;

        let affected = ack.count.unwrap_or(0);
        if affected == 0 {
            return Err(MirrorError::Upload(format!(
                "REDCap acknowledged a batch of {record_count} records with {affected} affected subjects"
            )));
        }

        summary.records_sent += record_count;
        summary.batches_sent += 1;
        tracing::debug!(
            batch = summary.batches_sent,
            records = record_count,
            subjects_affected = affected,
            "Batch acknowledged"
        );
        Ok(())
    }
}

fn read_upload_file(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        MirrorError::Io(format!("Cannot read upload file '{}': {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        MirrorError::Upload(format!(
            "Upload file '{}' is not a JSON array of records: {e}",
            path.display()
        ))
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Unique names of date-typed fields across every instrument
fn date_field_names(project: &ProjectMetadata) -> HashSet<&str> {
    project
        .instruments
        .iter()
        .flat_map(|instrument| instrument.fields.iter())
        .filter(|field| field.field_type == FieldType::Date)
        .map(|field| field.unique_name.as_str())
        .collect()
}

/// Normalize one record for transmission
///
/// Nulls and empty strings become empty strings (REDCap's blank), values
/// of date-typed fields are reparsed and reformatted `%Y-%m-%d`, and
/// everything else passes through untouched.
///
/// # Errors
///
/// Returns [`MirrorError::Upload`] when a date-typed field carries a
/// value that cannot be read as a date.
fn process_record(
    record: &Map<String, Value>,
    date_fields: &HashSet<&str>,
) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for (key, value) in record {
        let processed = match value {
            Value::Null => Value::String(String::new()),
            Value::String(s) if s.is_empty() => Value::String(String::new()),
            value if date_fields.contains(key.as_str()) => reformat_date(key, value)?,
            value => value.clone(),
        };
        out.insert(key.clone(), processed);
    }
    Ok(out)
}

fn reformat_date(field: &str, value: &Value) -> Result<Value> {
    let raw = value.as_str().ok_or_else(|| {
        MirrorError::Upload(format!(
            "Date field '{field}' carries a non-string value: {value}"
        ))
    })?;
    let date = parse_lenient_date(raw).ok_or_else(|| {
        MirrorError::Upload(format!("Cannot parse value '{raw}' for date field '{field}'"))
    })?;
    Ok(Value::String(date.format("%Y-%m-%d").to_string()))
}
