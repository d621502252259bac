//! Record transformation pipeline
//!
//! Converts raw export records into typed rows for the bulk load queue:
//! [`record`] wraps one flat API record, [`coerce`] turns raw strings into
//! typed cell values, and [`transformer`] drives the per-record algorithm
//! against the project metadata.

pub mod coerce;
pub mod record;
pub mod transformer;

pub use coerce::{coerce_value, parse_lenient_date, resolve_display};
pub use record::{RawRecord, EVENT_NAME_MARKER, REPEAT_INSTANCE_MARKER, REPEAT_INSTRUMENT_MARKER};
pub use transformer::RecordTransformer;
