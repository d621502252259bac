//! Project dictionary persistence
//!
//! The metadata model crosses command boundaries as a JSON document on
//! disk: `discover` writes it, `load` and `upload` read it. The document
//! records when it was generated alongside the full project tree.
//! Loading re-validates the tree, so a hand-edited dictionary (table or
//! column overrides are the supported edits) is checked the same way a
//! freshly discovered one is.

use crate::domain::{MirrorError, ProjectMetadata, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The on-disk dictionary document: a metadata model plus provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDictionary {
    /// When discovery produced this model
    pub generated_at: DateTime<Utc>,

    /// The complete metadata model
    pub project: ProjectMetadata,
}

impl ProjectDictionary {
    /// Wrap a freshly discovered model, stamping it with the current time
    pub fn new(project: ProjectMetadata) -> Self {
        Self {
            generated_at: Utc::now(),
            project,
        }
    }

    /// Write the dictionary as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Serialization`] when the model cannot be
    /// encoded and [`MirrorError::Io`] when the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MirrorError::Serialization(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| {
            MirrorError::Io(format!(
                "Cannot write dictionary file '{}': {e}",
                path.display()
            ))
        })?;
        tracing::info!(path = %path.display(), "Wrote project dictionary");
        Ok(())
    }

    /// Read a dictionary, then normalize and validate the model
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Dictionary`] when the file is missing,
    /// unreadable, not valid JSON, or describes a model that violates
    /// the metadata invariants.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MirrorError::Dictionary(format!(
                "Cannot read dictionary file '{}': {e}",
                path.display()
            ))
        })?;
        let mut dictionary: ProjectDictionary = serde_json::from_str(&raw).map_err(|e| {
            MirrorError::Dictionary(format!(
                "Dictionary file '{}' is not valid JSON: {e}",
                path.display()
            ))
        })?;
        dictionary.project.normalize();
        dictionary.project.validate()?;
        tracing::debug!(
            path = %path.display(),
            project = %dictionary.project.name,
            generated_at = %dictionary.generated_at,
            "Loaded project dictionary"
        );
        Ok(dictionary)
    }
}
