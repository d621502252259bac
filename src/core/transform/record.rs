//! Raw record wrapper
//!
//! One flat REDCap export record: field name → raw string value, with the
//! reserved event/repeat markers REDCap adds to longitudinal and repeating
//! data. Empty string and absent are both "no value".

use crate::domain::errors::MirrorError;
use crate::domain::ids::SubjectId;
use crate::domain::Result;
use std::collections::BTreeMap;

/// Marker naming the event a longitudinal record belongs to
pub const EVENT_NAME_MARKER: &str = "redcap_event_name";

/// Marker naming the repeating instrument a record describes
pub const REPEAT_INSTRUMENT_MARKER: &str = "redcap_repeat_instrument";

/// Marker carrying the 1-based repeat instance number
pub const REPEAT_INSTANCE_MARKER: &str = "redcap_repeat_instance";

/// One flat record from the source API
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRecord {
    fields: BTreeMap<String, String>,
}

impl RawRecord {
    /// Build a record from a JSON object
    ///
    /// REDCap exports every value as a string; nulls become empty strings
    /// and any stray scalar is stringified.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Transform`] when `value` is not a JSON object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            MirrorError::Transform(format!("expected a JSON object record, got: {value}"))
        })?;
        let mut fields = BTreeMap::new();
        for (name, raw) in object {
            let text = match raw {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            fields.insert(name.clone(), text);
        }
        Ok(Self { fields })
    }

    /// Build a record from name/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw value for a field, if the field exists (may be empty)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Non-empty value for a field
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    /// The subject identifier carried in the primary-key field
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Transform`] when the field is absent or
    /// empty; a record without its primary key cannot be attributed to a
    /// subject.
    pub fn primary_key_value(&self, primary_key_field: &str) -> Result<SubjectId> {
        let raw = self.value(primary_key_field).ok_or_else(|| {
            MirrorError::Transform(format!(
                "record is missing its primary-key field '{primary_key_field}'"
            ))
        })?;
        SubjectId::new(raw).map_err(MirrorError::Transform)
    }

    /// Event marker value, when present and non-empty
    pub fn event_name(&self) -> Option<&str> {
        self.value(EVENT_NAME_MARKER)
    }

    /// Repeat-instrument marker value, when present and non-empty
    pub fn repeat_instrument(&self) -> Option<&str> {
        self.value(REPEAT_INSTRUMENT_MARKER)
    }

    /// Parsed repeat-instance marker
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Transform`] when the marker is non-empty but
    /// not an integer; a garbled instance number means the record cannot be
    /// keyed correctly.
    pub fn repeat_instance(&self) -> Result<Option<i32>> {
        match self.value(REPEAT_INSTANCE_MARKER) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<i32>().map(Some).map_err(|_| {
                MirrorError::Transform(format!("invalid {REPEAT_INSTANCE_MARKER}: '{raw}'"))
            }),
        }
    }
}
