//! Target schema generation
//!
//! This module derives a relational schema description from a project's
//! metadata: one root table, one event table for longitudinal projects,
//! one table per instrument, and one lookup table per multi-valued field.
//! Generation is pure and deterministic; the physical DDL is executed by
//! the target store adapter.

pub mod generator;
pub mod tables;

pub use generator::ProjectSchema;
pub use tables::{
    lookup_fk_column, lookup_table_name, ColumnSpec, ColumnType, ForeignKeyRef, TableKind,
    TableSpec, EVENT_FK_COLUMN, EVENT_TABLE, REPEAT_INSTANCE_COLUMN, ROOT_FK_COLUMN, ROOT_TABLE,
};
