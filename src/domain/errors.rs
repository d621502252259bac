//! Domain error types
//!
//! This module defines the error hierarchy for capmirror. All errors are
//! domain-specific and don't expose third-party types to callers.

use thiserror::Error;

/// Main capmirror error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A referenced metadata entity does not exist in the project dictionary
    #[error("{entity} not found in project metadata: {name}")]
    MetadataNotFound {
        entity: MetadataEntity,
        name: String,
    },

    /// DDL failure while resetting or creating the project schema
    #[error("Schema materialization failed: {0}")]
    SchemaMaterialization(String),

    /// Batch insert failure; the in-flight batch is rolled back as a whole
    #[error("Bulk flush failed: {0}")]
    BulkFlush(String),

    /// Non-success response from the REDCap API, with the raw body for diagnosis
    #[error("Source fetch failed with status {status}: {body}")]
    SourceFetch { status: u16, body: String },

    /// A raw record is structurally unusable (e.g. missing its primary-key field)
    #[error("Record transform error: {0}")]
    Transform(String),

    /// Project dictionary file is missing, unreadable, or invalid
    #[error("Dictionary error: {0}")]
    Dictionary(String),

    /// Upload to REDCap failed
    #[error("Upload error: {0}")]
    Upload(String),

    /// Database-related errors outside of flush (connections, pool, queries)
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl MirrorError {
    /// Shorthand constructor for [`MirrorError::MetadataNotFound`]
    pub fn metadata_not_found(entity: MetadataEntity, name: impl Into<String>) -> Self {
        MirrorError::MetadataNotFound {
            entity,
            name: name.into(),
        }
    }
}

/// The kind of metadata entity a failed lookup was searching for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataEntity {
    Arm,
    Event,
    Instrument,
    Field,
}

impl std::fmt::Display for MetadataEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MetadataEntity::Arm => "Arm",
            MetadataEntity::Event => "Event",
            MetadataEntity::Instrument => "Instrument",
            MetadataEntity::Field => "Field",
        };
        write!(f, "{name}")
    }
}

/// Recoverable per-field coercion failure
///
/// Raised internally by the record transformer when a raw value cannot be
/// coerced to its field's declared type, or when a display-lookup key is
/// missing. Never propagates out of the transformer: the offending field is
/// left unset, the failure is logged, and its text is accumulated into the
/// run record's comments.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Field '{field}': cannot interpret '{value}' as {expected}")]
pub struct FieldCoercionError {
    /// Field unique name
    pub field: String,

    /// The raw value that failed to coerce
    pub value: String,

    /// Human description of the expected form ("an integer", "a date", ...)
    pub expected: String,
}

impl FieldCoercionError {
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for MirrorError {
    fn from(err: std::io::Error) -> Self {
        MirrorError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for MirrorError {
    fn from(err: serde_json::Error) -> Self {
        MirrorError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for MirrorError {
    fn from(err: toml::de::Error) -> Self {
        MirrorError::Configuration(format!("TOML parse error: {err}"))
    }
}
