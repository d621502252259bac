//! Run log records
//!
//! Every `load` and `upload` run writes one row to the control table
//! `capmirror.etl_runs`: started when the run begins, finalized with a
//! terminal status when it ends. A crashed run that never finalizes stays
//! visibly frozen at its started status.

use crate::domain::errors::MirrorError;
use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;

/// Direction of a run relative to the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDirection {
    /// Mirroring from REDCap into PostgreSQL
    Download,
    /// Pushing records back into REDCap
    Upload,
}

impl RunDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunDirection::Download => "download",
            RunDirection::Upload => "upload",
        }
    }
}

impl std::fmt::Display for RunDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunDirection {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(RunDirection::Download),
            "upload" => Ok(RunDirection::Upload),
            other => Err(MirrorError::Database(format!(
                "unknown run direction in etl_runs: '{other}'"
            ))),
        }
    }
}

/// Lifecycle status of a run
///
/// The stored text matches the status strings the companion dashboards
/// already filter on, so they are ordinary phrases rather than
/// identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    EtlStarted,
    EtlCompleted,
    EtlFailed,
    UploadStarted,
    UploadComplete,
    UploadFailed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::EtlStarted => "ETL started",
            RunStatus::EtlCompleted => "ETL completed",
            RunStatus::EtlFailed => "ETL failed",
            RunStatus::UploadStarted => "upload started",
            RunStatus::UploadComplete => "upload complete",
            RunStatus::UploadFailed => "upload failed",
        }
    }

    /// Whether the run has reached a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::EtlStarted | RunStatus::UploadStarted)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ETL started" => Ok(RunStatus::EtlStarted),
            "ETL completed" => Ok(RunStatus::EtlCompleted),
            "ETL failed" => Ok(RunStatus::EtlFailed),
            "upload started" => Ok(RunStatus::UploadStarted),
            "upload complete" => Ok(RunStatus::UploadComplete),
            "upload failed" => Ok(RunStatus::UploadFailed),
            other => Err(MirrorError::Database(format!(
                "unknown run status in etl_runs: '{other}'"
            ))),
        }
    }
}

/// One persisted run record
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub project: String,
    pub direction: RunDirection,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Number of source API calls the run issued
    pub query_count: Option<i32>,
    /// Newline-joined instrument allow-list; `None` means all instruments
    pub instruments_loaded: Option<String>,
    pub comment: Option<String>,
}

impl RunRecord {
    /// Wall-clock duration, whole seconds, `None` while the run is open
    pub fn duration(&self) -> Option<Duration> {
        let ended = self.ended_at?;
        let delta = ended - self.started_at;
        Some(Duration::seconds(delta.num_seconds()))
    }

    /// Human summary of what was loaded: a count, or "all"
    pub fn loaded_summary(&self) -> String {
        match &self.instruments_loaded {
            None => "all".to_string(),
            Some(text) => text.lines().filter(|l| !l.trim().is_empty()).count().to_string(),
        }
    }
}

/// Terminal update applied to an open run record
#[derive(Debug, Clone, PartialEq)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub ended_at: DateTime<Utc>,
    pub query_count: i32,
    pub instruments_loaded: Option<String>,
    pub comment: Option<String>,
}

impl RunCompletion {
    pub fn new(status: RunStatus, query_count: i32) -> Self {
        Self {
            status,
            ended_at: Utc::now(),
            query_count,
            instruments_loaded: None,
            comment: None,
        }
    }

    pub fn with_instruments(mut self, instruments: Option<&[String]>) -> Self {
        self.instruments_loaded = instruments
            .filter(|names| !names.is_empty())
            .map(|names| names.join("\n"));
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        if !comment.is_empty() {
            self.comment = Some(comment);
        }
        self
    }
}
