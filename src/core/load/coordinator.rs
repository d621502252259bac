//! Load coordinator - main orchestrator for the download direction
//!
//! This module coordinates a full mirror run: schema reset and
//! materialization, subject discovery, per-subject record fetching,
//! transformation, batched flushing, and run-log bookkeeping.
//!
//! A load is a full refresh. The project namespace is dropped and rebuilt
//! before any record is fetched, and the queue is flushed once per subject
//! so memory stays bounded and progress is observable at subject
//! granularity.

use crate::adapters::database::traits::TargetStore;
use crate::adapters::redcap::{RecordFilter, RedcapClient};
use crate::core::load::queue::BulkLoadQueue;
use crate::core::load::summary::LoadSummary;
use crate::core::runlog::{RunCompletion, RunDirection, RunStatus};
use crate::core::schema::ProjectSchema;
use crate::core::transform::RecordTransformer;
use crate::domain::ids::SubjectId;
use crate::domain::metadata::ProjectMetadata;
use crate::domain::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Load coordinator
pub struct LoadCoordinator {
    project: ProjectMetadata,
    /// Instrument allow-list; empty means every instrument loads
    include_instruments: Vec<String>,
    client: Arc<RedcapClient>,
    store: Arc<dyn TargetStore>,
}

impl LoadCoordinator {
    /// Create a new load coordinator
    pub fn new(
        project: ProjectMetadata,
        include_instruments: Vec<String>,
        client: Arc<RedcapClient>,
        store: Arc<dyn TargetStore>,
    ) -> Self {
        Self {
            project,
            include_instruments,
            client,
            store,
        }
    }

    /// Execute the load
    ///
    /// This is the main entry point for the download direction. It:
    /// 1. Opens a run record
    /// 2. Resets the project namespace and materializes the schema
    /// 3. Fetches the subject list (primary-key field filter, deduplicated)
    /// 4. For each subject: fetches records, transforms them, flushes the
    ///    queued rows as one atomic batch
    /// 5. Finalizes the run record with query count and warnings
    ///
    /// Any fatal error finalizes the run record with a failed status and
    /// the error message as comment, then propagates.
    pub async fn execute_load(&self) -> Result<LoadSummary> {
        let start = Instant::now();
        let mut summary = LoadSummary::new(self.project.name.as_str());

        tracing::info!(
            project = %self.project.name.as_str(),
            title = %self.project.title,
            longitudinal = self.project.longitudinal,
            "Starting load"
        );

        self.store.ensure_run_log().await?;
        let run_id = self
            .store
            .start_run(self.project.name.as_str(), RunDirection::Download)
            .await?;
        summary.run_id = run_id;

        let outcome = self.run_pipeline(&mut summary).await;
        summary.query_count = self.client.query_count();

        match outcome {
            Ok(()) => {
                let completion =
                    RunCompletion::new(RunStatus::EtlCompleted, summary.query_count as i32)
                        .with_instruments(Some(&self.include_instruments))
                        .with_comment(summary.warning_comment());
                self.store.finish_run(run_id, &completion).await?;

                summary = summary.with_duration(start.elapsed());
                summary.log_summary();
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Load failed");
                let completion =
                    RunCompletion::new(RunStatus::EtlFailed, summary.query_count as i32)
                        .with_instruments(Some(&self.include_instruments))
                        .with_comment(e.to_string());
                if let Err(log_err) = self.store.finish_run(run_id, &completion).await {
                    tracing::error!(
                        error = %log_err,
                        "Failed to finalize run record after load failure"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, summary: &mut LoadSummary) -> Result<()> {
        let schema = ProjectSchema::generate(&self.project);
        self.store.reset_namespace(&self.project.name).await?;
        self.store.apply_schema(&schema).await?;

        let subjects = self.fetch_subject_list().await?;
        tracing::info!(subjects = subjects.len(), "Fetched subject list");

        let mut queue = BulkLoadQueue::new(&self.project);
        let mut transformer =
            RecordTransformer::new(&self.project, Some(&self.include_instruments));

        for subject in &subjects {
            self.load_subject(subject, &mut transformer, &mut queue, summary)
                .await?;
        }

        // Normally empty here; every subject flushes its own rows.
        let batch = queue.take_batch();
        if !batch.is_empty() {
            summary.rows_written += self.store.insert_batch(&batch).await?;
        }

        summary.add_warnings(transformer.take_warnings());
        Ok(())
    }

    /// Fetch every distinct subject id, preserving first-seen order
    async fn fetch_subject_list(&self) -> Result<Vec<SubjectId>> {
        let filter = RecordFilter::new().with_field(&self.project.primary_key_field);
        let records = self.client.export_records(&filter).await?;

        let mut subjects = Vec::new();
        let mut seen = HashSet::new();
        for record in &records {
            let subject = record.primary_key_value(&self.project.primary_key_field)?;
            if seen.insert(subject.clone()) {
                subjects.push(subject);
            }
        }
        Ok(subjects)
    }

    /// Fetch, transform, and flush one subject's records
    async fn load_subject(
        &self,
        subject: &SubjectId,
        transformer: &mut RecordTransformer<'_>,
        queue: &mut BulkLoadQueue,
        summary: &mut LoadSummary,
    ) -> Result<()> {
        let mut filter = RecordFilter::new().with_record(subject.as_str());
        if !self.include_instruments.is_empty() {
            filter = filter.with_forms(self.include_instruments.iter().cloned());
        }

        let records = self.client.export_records(&filter).await?;
        tracing::debug!(
            subject = %subject.as_str(),
            records = records.len(),
            "Fetched subject records"
        );

        for record in &records {
            transformer.transform(record, queue)?;
            summary.records_processed += 1;
        }

        let batch = queue.take_batch();
        if !batch.is_empty() {
            summary.rows_written += self.store.insert_batch(&batch).await?;
        }
        summary.subjects_loaded += 1;
        Ok(())
    }
}
