//! REDCap API response models
//!
//! Typed views of the JSON the REDCap API returns, plus the record filter
//! used to restrict exports. REDCap stringifies aggressively (flags come
//! back as `0`/`1` numbers or strings depending on version), so flag and
//! number fields deserialize leniently.

use serde::{Deserialize, Deserializer};

/// Accept a boolean flag encoded as bool, integer, or string
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }
    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(n) => Ok(n != 0),
        Flag::Text(s) => Ok(s == "1" || s.eq_ignore_ascii_case("true")),
    }
}

/// Accept an integer encoded as number or string
fn deserialize_number<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(i64),
        Text(String),
    }
    match Number::deserialize(deserializer)? {
        Number::Int(n) => i32::try_from(n).map_err(serde::de::Error::custom),
        Number::Text(s) => s.trim().parse::<i32>().map_err(serde::de::Error::custom),
    }
}

/// `content=project` response (the fields discovery needs)
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInfo {
    pub project_title: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub is_longitudinal: bool,
}

/// One entry of the `content=exportFieldNames` response
#[derive(Debug, Clone, Deserialize)]
pub struct ExportFieldName {
    pub export_field_name: String,
}

/// One entry of the `content=arm` response
#[derive(Debug, Clone, Deserialize)]
pub struct ArmInfo {
    #[serde(deserialize_with = "deserialize_number")]
    pub arm_num: i32,
    pub name: String,
}

/// One entry of the `content=instrument` response
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentInfo {
    pub instrument_name: String,
    pub instrument_label: String,
}

/// One entry of the `content=event` response
///
/// `event_name` is the display label; `unique_event_name` is the key
/// records carry in their event marker.
#[derive(Debug, Clone, Deserialize)]
pub struct EventInfo {
    pub event_name: String,
    #[serde(deserialize_with = "deserialize_number")]
    pub arm_num: i32,
    pub unique_event_name: String,
}

/// One entry of the `content=formEventMapping` response
#[derive(Debug, Clone, Deserialize)]
pub struct FormEventMapping {
    pub unique_event_name: String,
    pub form: String,
}

/// One entry of the `content=repeatingFormsEvents` response
///
/// `event_name` is present only for longitudinal projects; `form_name` is
/// null when the entire event repeats rather than a form within it.
#[derive(Debug, Clone, Deserialize)]
pub struct RepeatingFormEvent {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub form_name: Option<String>,
}

/// One entry of the `content=metadata` (data dictionary) response
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefinition {
    pub field_name: String,
    pub form_name: String,
    pub field_type: String,
    #[serde(default)]
    pub field_label: String,
    #[serde(default)]
    pub select_choices_or_calculations: String,
    #[serde(default)]
    pub text_validation_type_or_show_slider_number: String,
}

/// Acknowledgment of a `content=record` import
#[derive(Debug, Clone, Deserialize)]
pub struct ImportAck {
    #[serde(default)]
    pub count: Option<i64>,
}

/// Restriction applied to a record export
///
/// Empty lists impose no restriction on their axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub fields: Vec<String>,
    pub records: Vec<String>,
    pub forms: Vec<String>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the export to one field
    pub fn with_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Restrict the export to one subject
    pub fn with_record(mut self, id: impl Into<String>) -> Self {
        self.records.push(id.into());
        self
    }

    /// Restrict the export to the given forms
    pub fn with_forms<I, S>(mut self, forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forms.extend(forms.into_iter().map(Into::into));
        self
    }

    /// Indexed-array form parameters the REDCap API expects
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for (idx, field) in self.fields.iter().enumerate() {
            params.push((format!("fields[{idx}]"), field.clone()));
        }
        for (idx, record) in self.records.iter().enumerate() {
            params.push((format!("records[{idx}]"), record.clone()));
        }
        for (idx, form) in self.forms.iter().enumerate() {
            params.push((format!("forms[{idx}]"), form.clone()));
        }
        params
    }
}
