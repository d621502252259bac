//! Typed row records produced by the record transformer
//!
//! One tagged variant per target table kind (root, event, instrument,
//! lookup) plus the typed cell value that instrument columns carry. Rows
//! are ephemeral to one load run: the transformer builds them, the bulk
//! load queue buffers them, and the target store commits them per batch.

use crate::domain::ids::{ProjectName, SubjectId};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A typed value destined for one instrument-table column
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i32),
    Float(f64),
    Date(NaiveDate),
    Boolean(bool),
}

impl CellValue {
    /// Short type name for logs and error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Text(_) => "text",
            CellValue::Integer(_) => "integer",
            CellValue::Float(_) => "float",
            CellValue::Date(_) => "date",
            CellValue::Boolean(_) => "boolean",
        }
    }
}

/// One row in the project root table: one distinct subject
///
/// The root table's display column is generated but never populated by the
/// load pipeline, so the row carries only the subject key.
#[derive(Debug, Clone, PartialEq)]
pub struct RootRow {
    pub subject: SubjectId,
}

/// One row in the event table: a subject's occurrence of one event
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    /// Surrogate id; `None` until the queue assigns one
    pub id: Option<i64>,
    pub subject: SubjectId,
    pub event_unique_name: String,
    pub event_label: String,
    pub arm_number: i32,
    /// Set when the event itself repeats
    pub repeat_instance: Option<i32>,
}

/// What an instrument row hangs off of
#[derive(Debug, Clone, PartialEq)]
pub enum RowOwner {
    /// Non-longitudinal: owned directly by the subject's root row
    Root(SubjectId),
    /// Longitudinal: owned by an event row, by surrogate id
    Event(i64),
}

/// One row in an instrument table
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRow {
    /// Surrogate id; `None` until reserved or assigned by the queue
    pub id: Option<i64>,
    pub owner: RowOwner,
    pub repeat_instance: Option<i32>,
    /// Column name → coerced value. Display values appear here as text
    /// cells under their `{column}_display_value` name.
    pub values: BTreeMap<String, CellValue>,
}

impl InstrumentRow {
    pub fn new(owner: RowOwner) -> Self {
        Self {
            id: None,
            owner,
            repeat_instance: None,
            values: BTreeMap::new(),
        }
    }

    /// Set one column value
    pub fn set(&mut self, column: impl Into<String>, value: CellValue) {
        self.values.insert(column.into(), value);
    }
}

/// One selected option of a multi-valued field
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRow {
    /// Surrogate id; `None` until the queue assigns one
    pub id: Option<i64>,
    /// Surrogate id of the owning instrument row
    pub instrument_id: i64,
    /// The option's raw key
    pub option_key: String,
    /// The option's display label
    pub display_value: String,
}

/// Queued rows for the root table
#[derive(Debug, Clone, PartialEq)]
pub struct RootBatch {
    pub table: String,
    /// Primary-key column name (the project's primary-key field)
    pub key_column: String,
    pub rows: Vec<RootRow>,
}

/// Queued rows for the event table
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
    pub table: String,
    pub rows: Vec<EventRow>,
}

/// Queued rows for one instrument table
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentTableBatch {
    pub table: String,
    pub rows: Vec<InstrumentRow>,
}

/// Queued rows for one lookup table
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTableBatch {
    pub table: String,
    /// Foreign-key column to the owning instrument table
    pub fk_column: String,
    /// Column holding the option's raw key
    pub value_column: String,
    /// Column holding the option's display label
    pub display_column: String,
    pub rows: Vec<LookupRow>,
}

/// Everything one flush commits, in dependency order
///
/// The store must apply the whole batch atomically: root rows, then event
/// rows, then instrument tables, then lookup tables.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    pub namespace: ProjectName,
    pub roots: RootBatch,
    pub events: EventBatch,
    pub instruments: Vec<InstrumentTableBatch>,
    pub lookups: Vec<LookupTableBatch>,
}

impl RowBatch {
    /// Total number of rows across all tables
    pub fn row_count(&self) -> usize {
        self.roots.rows.len()
            + self.events.rows.len()
            + self.instruments.iter().map(|t| t.rows.len()).sum::<usize>()
            + self.lookups.iter().map(|t| t.rows.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_type_names() {
        assert_eq!(CellValue::Text("x".to_string()).type_name(), "text");
        assert_eq!(CellValue::Integer(7).type_name(), "integer");
        assert_eq!(CellValue::Float(1.5).type_name(), "float");
        assert_eq!(CellValue::Boolean(true).type_name(), "boolean");
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(CellValue::Date(date).type_name(), "date");
    }

    #[test]
    fn test_instrument_row_set() {
        let subject = SubjectId::new("S1").unwrap();
        let mut row = InstrumentRow::new(RowOwner::Root(subject));
        row.set("age", CellValue::Integer(34));
        assert_eq!(row.values.get("age"), Some(&CellValue::Integer(34)));
        assert!(row.id.is_none());
    }

    #[test]
    fn test_row_batch_counts() {
        let namespace = ProjectName::new("demo").unwrap();
        let batch = RowBatch {
            namespace,
            roots: RootBatch {
                table: "project_root".to_string(),
                key_column: "study_id".to_string(),
                rows: vec![RootRow {
                    subject: SubjectId::new("S1").unwrap(),
                }],
            },
            events: EventBatch {
                table: "redcap_event".to_string(),
                rows: vec![],
            },
            instruments: vec![InstrumentTableBatch {
                table: "demographics".to_string(),
                rows: vec![InstrumentRow::new(RowOwner::Root(
                    SubjectId::new("S1").unwrap(),
                ))],
            }],
            lookups: vec![],
        };
        assert_eq!(batch.row_count(), 2);
        assert!(!batch.is_empty());
    }
}
