//! Table and column descriptions plus DDL rendering
//!
//! These types are the output vocabulary of the schema generator. Rendering
//! is deterministic: the same spec always produces byte-identical SQL.

use serde::{Deserialize, Serialize};

/// Name of the per-project root table
pub const ROOT_TABLE: &str = "project_root";

/// Name of the per-project event table (longitudinal projects only)
pub const EVENT_TABLE: &str = "redcap_event";

/// Foreign-key column from instrument/event tables to the root table
pub const ROOT_FK_COLUMN: &str = "project_root_id";

/// Foreign-key column from instrument tables to the event table
pub const EVENT_FK_COLUMN: &str = "redcap_event_id";

/// Repeat-instance column carried by event and instrument tables
pub const REPEAT_INSTANCE_COLUMN: &str = "redcap_repeat_instance";

/// Name of the lookup table for one multi-valued field
pub fn lookup_table_name(instrument_table: &str, field_column: &str) -> String {
    format!("{instrument_table}_{field_column}_lookup")
}

/// Foreign-key column from a lookup table to its instrument table
pub fn lookup_fk_column(instrument_table: &str) -> String {
    format!("{instrument_table}_id")
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    BigInt,
    Integer,
    Float,
    Text,
    VarChar(u16),
    Date,
    Boolean,
}

impl ColumnType {
    /// PostgreSQL type name
    pub fn sql(&self) -> String {
        match self {
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Float => "DOUBLE PRECISION".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::VarChar(len) => format!("VARCHAR({len})"),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
        }
    }
}

/// Reference to another table's column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// One column in a generated table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyRef>,
}

impl ColumnSpec {
    /// Plain nullable data column
    pub fn data(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            references: None,
        }
    }

    /// Primary-key column
    pub fn primary_key(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            primary_key: true,
            references: None,
        }
    }

    /// Non-nullable foreign-key column
    pub fn foreign_key(
        name: impl Into<String>,
        column_type: ColumnType,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            primary_key: false,
            references: Some(ForeignKeyRef {
                table: table.into(),
                column: column.into(),
            }),
        }
    }

    fn render(&self, namespace: &str) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.column_type.sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(fk) = &self.references {
            sql.push_str(&format!(
                " REFERENCES {}.{} ({})",
                quote_ident(namespace),
                quote_ident(&fk.table),
                quote_ident(&fk.column)
            ));
        }
        sql
    }
}

/// Tier of a generated table, used for dependency ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableKind {
    Root,
    Event,
    Instrument,
    Lookup,
}

/// One generated table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Render the CREATE TABLE statement for this table inside `namespace`
    pub fn create_sql(&self, namespace: &str) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {}", c.render(namespace)))
            .collect();
        format!(
            "CREATE TABLE {}.{} (\n{}\n)",
            quote_ident(namespace),
            quote_ident(&self.name),
            columns.join(",\n")
        )
    }

    /// Look up one column by name
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}
