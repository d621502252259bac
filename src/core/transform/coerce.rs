//! Per-field value coercion
//!
//! Converts raw export strings into typed [`CellValue`]s according to each
//! field's declared type. Failures are recoverable: the caller logs them,
//! leaves the column unset, and carries on with the rest of the record.

use crate::domain::errors::FieldCoercionError;
use crate::domain::metadata::{FieldMetadata, FieldType};
use crate::domain::rows::CellValue;
use chrono::{NaiveDate, NaiveDateTime};

/// Date formats accepted for date-typed fields, tried in order. REDCap
/// exports ISO dates; the rest cover hand-entered values seen in practice.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%m/%d/%y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Datetime formats whose date part is accepted for date-typed fields
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parse a date from any accepted format
pub fn parse_lenient_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    None
}

/// Coerce one raw value to the field's declared type
///
/// `Ok(None)` means the value is blank and the column stays unset. Text
/// values pass through unchanged; all other types parse a trimmed copy.
///
/// # Errors
///
/// Returns [`FieldCoercionError`] when the value cannot be interpreted as
/// the declared type. The caller is expected to log the error and leave
/// the column unset rather than abort the record.
pub fn coerce_value(
    field: &FieldMetadata,
    raw: &str,
) -> std::result::Result<Option<CellValue>, FieldCoercionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match field.field_type {
        FieldType::Text => Ok(Some(CellValue::Text(raw.to_string()))),
        FieldType::Integer => trimmed
            .parse::<i32>()
            .map(|v| Some(CellValue::Integer(v)))
            .map_err(|_| FieldCoercionError::new(&field.unique_name, raw, "an integer")),
        FieldType::Float => match trimmed.parse::<f64>() {
            // Non-finite floats would poison aggregates downstream
            Ok(v) if v.is_finite() => Ok(Some(CellValue::Float(v))),
            _ => Err(FieldCoercionError::new(
                &field.unique_name,
                raw,
                "a decimal number",
            )),
        },
        FieldType::Date => parse_lenient_date(trimmed)
            .map(|d| Some(CellValue::Date(d)))
            .ok_or_else(|| FieldCoercionError::new(&field.unique_name, raw, "a date")),
        FieldType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(CellValue::Boolean(true))),
            "false" | "0" => Ok(Some(CellValue::Boolean(false))),
            _ => Err(FieldCoercionError::new(
                &field.unique_name,
                raw,
                "a boolean",
            )),
        },
    }
}

/// Resolve the display label for a coded value
///
/// Keys are stored lowercase in the dictionary, so the value is lowercased
/// before lookup.
///
/// # Errors
///
/// Returns [`FieldCoercionError`] when the value is not a key of the
/// field's display lookup. The main column keeps the raw value either way;
/// only the display column stays unset.
pub fn resolve_display(
    field: &FieldMetadata,
    value: &str,
) -> std::result::Result<String, FieldCoercionError> {
    field
        .display_lookup
        .get(&value.to_lowercase())
        .cloned()
        .ok_or_else(|| FieldCoercionError::new(&field.unique_name, value, "a display-lookup key"))
}
