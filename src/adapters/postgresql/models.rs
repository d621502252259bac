//! Mappings between domain types and PostgreSQL rows
//!
//! Cell values travel to the database as their concrete Rust types, which
//! the generated column types line up with one to one. Run records come
//! back from `capmirror.etl_runs` through [`run_record_from_row`].

use crate::core::runlog::{RunDirection, RunRecord, RunStatus};
use crate::domain::rows::CellValue;
use crate::domain::Result;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

/// Borrow a cell as a SQL parameter of its concrete type
pub fn cell_param(value: &CellValue) -> &(dyn ToSql + Sync) {
    match value {
        CellValue::Text(v) => v,
        CellValue::Integer(v) => v,
        CellValue::Float(v) => v,
        CellValue::Date(v) => v,
        CellValue::Boolean(v) => v,
    }
}

/// Map one `etl_runs` row to a domain run record
///
/// # Errors
///
/// Returns an error if the stored direction or status label is not one the
/// run log writes.
pub fn run_record_from_row(row: &Row) -> Result<RunRecord> {
    let direction: String = row.get("direction");
    let status: String = row.get("status");

    Ok(RunRecord {
        id: row.get("id"),
        project: row.get("project"),
        direction: direction.parse::<RunDirection>()?,
        status: status.parse::<RunStatus>()?,
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        query_count: row.get("query_count"),
        instruments_loaded: row.get("instruments_loaded"),
        comment: row.get("comment"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_cell_param_borrows_concrete_types() {
        // The trait object must carry the value's own SQL representation,
        // so a DATE cell round-trips as a chrono date rather than text.
        let date = CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let param = cell_param(&date);
        assert!(param.to_sql_checked(&tokio_postgres::types::Type::DATE, &mut Default::default()).is_ok());

        let count = CellValue::Integer(42);
        let param = cell_param(&count);
        assert!(param.to_sql_checked(&tokio_postgres::types::Type::INT4, &mut Default::default()).is_ok());
        assert!(param.to_sql_checked(&tokio_postgres::types::Type::DATE, &mut Default::default()).is_err());
    }
}
