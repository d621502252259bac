//! REDCap project metadata model
//!
//! This module describes the structure of one REDCap project: its arms,
//! events, instruments, fields, multi-select options, and the associations
//! between events and instruments. The model is produced by the `discover`
//! command, persisted as the project dictionary file, and consumed read-only
//! by schema generation and record transformation.
//!
//! Accessors guarantee deterministic ordering: events and fields follow
//! their `ordering` attribute, arms follow their arm number, instruments
//! are alphabetic by unique name, and display-lookup iteration is
//! alphabetic by option key.

use crate::domain::errors::{MetadataEntity, MirrorError};
use crate::domain::ids::ProjectName;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Separator between a multi-valued field's name and an option key in the
/// flat REDCap export, e.g. `race___2`.
pub const OPTION_SEPARATOR: &str = "___";

/// Target value type for a field column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Date,
    Boolean,
}

impl FieldType {
    /// Stable lowercase name, used in logs and the dictionary file
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single data element belonging to one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    /// Field unique name (unique within its instrument)
    pub unique_name: String,

    /// Target column name override; `None` means the unique name is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_override: Option<String>,

    /// Display label from the REDCap data dictionary
    pub label: String,

    /// 1-based position within the instrument
    pub ordering: u32,

    /// Target value type
    pub field_type: FieldType,

    /// Raw coded value → human-readable label; non-empty only for
    /// coded/select fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub display_lookup: BTreeMap<String, String>,

    /// True for checkbox fields, where the source exports one boolean
    /// sub-field per option
    #[serde(default)]
    pub multi_valued: bool,
}

impl FieldMetadata {
    /// Target column name: the override when present, else the unique name
    pub fn column_name(&self) -> &str {
        self.column_override.as_deref().unwrap_or(&self.unique_name)
    }

    /// Name of the sibling display column for fields with a lookup
    pub fn display_column_name(&self) -> String {
        format!("{}_display_value", self.column_name())
    }

    /// Whether this field carries a non-empty display lookup
    pub fn has_display_lookup(&self) -> bool {
        !self.display_lookup.is_empty()
    }

    /// Source sub-field name for one option of a multi-valued field
    ///
    /// REDCap exports checkbox selections as `{field}___{option_key}`.
    pub fn sub_field_name(&self, option_key: &str) -> String {
        format!("{}{}{}", self.unique_name, OPTION_SEPARATOR, option_key)
    }

    /// All source sub-field names for a multi-valued field, in option order
    pub fn sub_field_names(&self) -> Vec<String> {
        self.display_lookup
            .keys()
            .map(|key| self.sub_field_name(key))
            .collect()
    }
}

/// Association between one event and one instrument
///
/// Exists only for longitudinal projects; encodes which instruments are
/// collected at which events, and whether the instrument repeats within
/// the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInstrumentMetadata {
    /// Unique name of the associated instrument
    pub instrument: String,

    /// Whether the instrument repeats within this event
    #[serde(default)]
    pub repeatable: bool,

    /// 1-based position within the event
    pub ordering: u32,
}

/// A longitudinal timepoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Event unique name (unique within the project)
    pub unique_name: String,

    /// Display label
    pub label: String,

    /// Number of the arm this event belongs to
    pub arm_number: i32,

    /// 1-based position within the project
    pub ordering: u32,

    /// Whether the entire event repeats
    #[serde(default)]
    pub repeatable: bool,

    /// Instruments collected at this event, in association order
    #[serde(default)]
    pub instruments: Vec<EventInstrumentMetadata>,
}

/// A numbered study arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmMetadata {
    /// Arm number (unique within the project)
    pub arm_number: i32,

    /// Display name
    pub name: String,
}

/// A data-collection form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMetadata {
    /// Instrument unique name (unique within the project)
    pub unique_name: String,

    /// Target table name override; `None` means the unique name is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_override: Option<String>,

    /// Display label
    pub label: String,

    /// Whether the instrument repeats. Meaningful only for non-longitudinal
    /// projects; for longitudinal projects repeatability lives on the
    /// event↔instrument association.
    #[serde(default)]
    pub repeatable: bool,

    /// Fields on this instrument, in `ordering` order
    pub fields: Vec<FieldMetadata>,
}

impl InstrumentMetadata {
    /// Target table name: the override when present, else the unique name
    pub fn table_name(&self) -> &str {
        self.table_override.as_deref().unwrap_or(&self.unique_name)
    }

    /// Fields that map to ordinary columns (excludes multi-valued fields)
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldMetadata> {
        self.fields.iter().filter(|f| !f.multi_valued)
    }

    /// Multi-valued (checkbox) fields, each backed by a lookup table
    pub fn multi_valued_fields(&self) -> impl Iterator<Item = &FieldMetadata> {
        self.fields.iter().filter(|f| f.multi_valued)
    }

    /// Resolve one field by unique name
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::MetadataNotFound`] when no field has the name.
    pub fn field(&self, unique_name: &str) -> Result<&FieldMetadata> {
        self.fields
            .iter()
            .find(|f| f.unique_name == unique_name)
            .ok_or_else(|| MirrorError::metadata_not_found(MetadataEntity::Field, unique_name))
    }
}

/// The complete metadata model for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Project namespace name; also the PostgreSQL schema name
    pub name: ProjectName,

    /// Project title as reported by the source
    pub title: String,

    /// Name of the subject identifier field. Immutable once data has been
    /// loaded: changing it invalidates every downstream table.
    pub primary_key_field: String,

    /// Whether the project is longitudinal (has events)
    pub longitudinal: bool,

    /// Whether the project defines more than one arm
    #[serde(default)]
    pub multiple_arms: bool,

    /// Arms, in arm-number order
    #[serde(default)]
    pub arms: Vec<ArmMetadata>,

    /// Events, in `ordering` order; empty for non-longitudinal projects
    #[serde(default)]
    pub events: Vec<EventMetadata>,

    /// Instruments, alphabetic by unique name
    pub instruments: Vec<InstrumentMetadata>,
}

impl ProjectMetadata {
    /// Resolve one instrument by unique name
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::MetadataNotFound`] when no instrument has the
    /// name. Callers rely on this to detect metadata/schema mismatches
    /// instead of silently skipping data.
    pub fn instrument(&self, unique_name: &str) -> Result<&InstrumentMetadata> {
        self.instruments
            .iter()
            .find(|i| i.unique_name == unique_name)
            .ok_or_else(|| MirrorError::metadata_not_found(MetadataEntity::Instrument, unique_name))
    }

    /// Instruments that do not repeat (base-record candidates for
    /// non-longitudinal projects)
    pub fn non_repeating_instruments(&self) -> impl Iterator<Item = &InstrumentMetadata> {
        self.instruments.iter().filter(|i| !i.repeatable)
    }

    /// Resolve one event by unique name
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::MetadataNotFound`] when no event has the name.
    pub fn event(&self, unique_name: &str) -> Result<&EventMetadata> {
        self.events
            .iter()
            .find(|e| e.unique_name == unique_name)
            .ok_or_else(|| MirrorError::metadata_not_found(MetadataEntity::Event, unique_name))
    }

    /// Resolve one arm by number
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::MetadataNotFound`] when no arm has the number.
    pub fn arm(&self, arm_number: i32) -> Result<&ArmMetadata> {
        self.arms
            .iter()
            .find(|a| a.arm_number == arm_number)
            .ok_or_else(|| {
                MirrorError::metadata_not_found(MetadataEntity::Arm, arm_number.to_string())
            })
    }

    /// Instruments associated with an event, in association order
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::MetadataNotFound`] when an association names
    /// an instrument the project does not define.
    pub fn event_instruments(&self, event: &EventMetadata) -> Result<Vec<&InstrumentMetadata>> {
        event
            .instruments
            .iter()
            .map(|assoc| self.instrument(&assoc.instrument))
            .collect()
    }

    /// Sort every collection into its canonical order
    ///
    /// Called after discovery and after loading a dictionary file so that
    /// schema generation and record iteration are deterministic regardless
    /// of source order.
    pub fn normalize(&mut self) {
        self.arms.sort_by_key(|a| a.arm_number);
        self.events.sort_by_key(|e| e.ordering);
        for event in &mut self.events {
            event.instruments.sort_by_key(|ei| ei.ordering);
        }
        self.instruments
            .sort_by(|a, b| a.unique_name.cmp(&b.unique_name));
        for instrument in &mut self.instruments {
            instrument.fields.sort_by_key(|f| f.ordering);
        }
    }

    /// Check the invariants that table generation depends on
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Dictionary`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.primary_key_field.trim().is_empty() {
            return Err(MirrorError::Dictionary(
                "primary_key_field must not be empty".to_string(),
            ));
        }
        if self.instruments.is_empty() {
            return Err(MirrorError::Dictionary(
                "project defines no instruments".to_string(),
            ));
        }

        let mut instrument_names = HashSet::new();
        for instrument in &self.instruments {
            if !instrument_names.insert(instrument.unique_name.as_str()) {
                return Err(MirrorError::Dictionary(format!(
                    "duplicate instrument name: {}",
                    instrument.unique_name
                )));
            }
            let mut field_names = HashSet::new();
            for field in &instrument.fields {
                if !field_names.insert(field.unique_name.as_str()) {
                    return Err(MirrorError::Dictionary(format!(
                        "duplicate field name in instrument {}: {}",
                        instrument.unique_name, field.unique_name
                    )));
                }
            }
        }

        if !self.longitudinal && !self.events.is_empty() {
            return Err(MirrorError::Dictionary(
                "non-longitudinal project must not define events".to_string(),
            ));
        }

        let mut event_names = HashSet::new();
        for event in &self.events {
            if !event_names.insert(event.unique_name.as_str()) {
                return Err(MirrorError::Dictionary(format!(
                    "duplicate event name: {}",
                    event.unique_name
                )));
            }
            if self.arm(event.arm_number).is_err() {
                return Err(MirrorError::Dictionary(format!(
                    "event {} references undefined arm {}",
                    event.unique_name, event.arm_number
                )));
            }
            for assoc in &event.instruments {
                if !instrument_names.contains(assoc.instrument.as_str()) {
                    return Err(MirrorError::Dictionary(format!(
                        "event {} references undefined instrument {}",
                        event.unique_name, assoc.instrument
                    )));
                }
            }
        }

        Ok(())
    }
}
