//! Load summary and reporting
//!
//! This module defines the structure for tracking and reporting the result
//! of one download run.

use std::time::Duration;

/// Summary of a load operation
#[derive(Debug, Clone)]
pub struct LoadSummary {
    /// Project namespace the run loaded into
    pub project: String,

    /// Run-log record id for this run
    pub run_id: i64,

    /// Number of distinct subjects processed
    pub subjects_loaded: usize,

    /// Number of source records transformed
    pub records_processed: usize,

    /// Number of rows committed to the target store
    pub rows_written: usize,

    /// Number of source API queries issued
    pub query_count: u64,

    /// Recovered per-field warnings accumulated during the run
    pub warnings: Vec<String>,

    /// Duration of the load
    pub duration: Duration,
}

impl LoadSummary {
    /// Create a new empty load summary
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            run_id: 0,
            subjects_loaded: 0,
            records_processed: 0,
            rows_written: 0,
            query_count: 0,
            warnings: Vec::new(),
            duration: Duration::from_secs(0),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Record recovered warnings
    pub fn add_warnings(&mut self, warnings: Vec<String>) {
        self.warnings.extend(warnings);
    }

    /// Check if the load recovered no field failures
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Warnings joined for the run record comment; empty when clean
    pub fn warning_comment(&self) -> String {
        self.warnings.join("\n")
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            project = %self.project,
            run_id = self.run_id,
            subjects = self.subjects_loaded,
            records = self.records_processed,
            rows = self.rows_written,
            queries = self.query_count,
            duration_secs = self.duration.as_secs(),
            "Load completed"
        );

        if !self.warnings.is_empty() {
            tracing::warn!(
                warning_count = self.warnings.len(),
                "Load completed with recovered field warnings"
            );
            for warning in &self.warnings {
                tracing::warn!(message = %warning, "Recovered warning");
            }
        }
    }
}
