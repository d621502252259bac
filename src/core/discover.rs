//! Project metadata discovery
//!
//! Interrogates the REDCap API and assembles the complete
//! [`ProjectMetadata`] tree: project info, primary-key field, arms,
//! instruments, events, event/instrument associations, repeating
//! designations, and the per-field data dictionary. The result is
//! normalized and validated before it is handed back, so a successful
//! discovery always yields a model that schema generation accepts.

use crate::adapters::redcap::{
    FieldDefinition, FormEventMapping, RedcapClient, RepeatingFormEvent,
};
use crate::domain::errors::MetadataEntity;
use crate::domain::metadata::{
    ArmMetadata, EventInstrumentMetadata, EventMetadata, FieldMetadata, FieldType,
    InstrumentMetadata, ProjectMetadata,
};
use crate::domain::{MirrorError, ProjectName, Result};
use std::collections::BTreeMap;

/// Arm assigned to non-longitudinal projects, which REDCap reports no
/// arms for
const DEFAULT_ARM_NUMBER: i32 = 1;
const DEFAULT_ARM_NAME: &str = "Arm 1";

/// Builds the metadata model for one project by querying the REDCap API
pub struct MetadataDiscovery<'a> {
    client: &'a RedcapClient,
    project_name: ProjectName,
}

impl<'a> MetadataDiscovery<'a> {
    pub fn new(client: &'a RedcapClient, project_name: ProjectName) -> Self {
        Self {
            client,
            project_name,
        }
    }

    /// Run the full discovery sequence against the API
    ///
    /// # Errors
    ///
    /// Fails on API errors, on a data dictionary the model cannot
    /// represent (unknown field type, malformed option list), and on
    /// responses that reference undefined arms, events, or instruments.
    pub async fn discover(&self) -> Result<ProjectMetadata> {
        let info = self.client.export_project_info().await?;
        tracing::info!(
            project = %self.project_name,
            title = %info.project_title,
            longitudinal = info.is_longitudinal,
            "Discovering project metadata"
        );

        let mut project = ProjectMetadata {
            name: self.project_name.clone(),
            title: info.project_title,
            primary_key_field: self.fetch_primary_key_field().await?,
            longitudinal: info.is_longitudinal,
            multiple_arms: false,
            arms: Vec::new(),
            events: Vec::new(),
            instruments: Vec::new(),
        };

        self.fetch_arms(&mut project).await?;
        self.fetch_instruments(&mut project).await?;
        if project.longitudinal {
            self.fetch_events(&mut project).await?;
            let mappings = self.client.export_form_event_mapping().await?;
            apply_form_event_mappings(&mut project, &mappings)?;
        }
        if let Some(entries) = self.client.export_repeating_forms_events().await? {
            apply_repeating_designations(&mut project, &entries);
        }
        let definitions = self.client.export_metadata().await?;
        apply_field_definitions(&mut project, &definitions)?;

        project.normalize();
        project.validate()?;

        tracing::info!(
            project = %project.name,
            instruments = project.instruments.len(),
            events = project.events.len(),
            fields = project
                .instruments
                .iter()
                .map(|i| i.fields.len())
                .sum::<usize>(),
            "Project metadata discovery complete"
        );
        Ok(project)
    }

    /// The first export field name is the project's record identifier
    async fn fetch_primary_key_field(&self) -> Result<String> {
        let names = self.client.export_field_names().await?;
        names
            .first()
            .map(|entry| entry.export_field_name.clone())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                MirrorError::Dictionary(
                    "REDCap returned no export field names; cannot determine the primary-key field"
                        .to_string(),
                )
            })
    }

    async fn fetch_arms(&self, project: &mut ProjectMetadata) -> Result<()> {
        if !project.longitudinal {
            project.arms.push(ArmMetadata {
                arm_number: DEFAULT_ARM_NUMBER,
                name: DEFAULT_ARM_NAME.to_string(),
            });
            return Ok(());
        }
        let arms = self.client.export_arms().await?;
        project.multiple_arms = arms.len() > 1;
        project.arms = arms
            .into_iter()
            .map(|arm| ArmMetadata {
                arm_number: arm.arm_num,
                name: arm.name,
            })
            .collect();
        tracing::debug!(arms = project.arms.len(), "Fetched arms");
        Ok(())
    }

    async fn fetch_instruments(&self, project: &mut ProjectMetadata) -> Result<()> {
        let instruments = self.client.export_instruments().await?;
        project.instruments = instruments
            .into_iter()
            .map(|instrument| InstrumentMetadata {
                unique_name: instrument.instrument_name,
                table_override: None,
                label: instrument.instrument_label,
                repeatable: false,
                fields: Vec::new(),
            })
            .collect();
        tracing::debug!(instruments = project.instruments.len(), "Fetched instruments");
        Ok(())
    }

    async fn fetch_events(&self, project: &mut ProjectMetadata) -> Result<()> {
        let events = self.client.export_events().await?;
        for (idx, info) in events.into_iter().enumerate() {
            // An event naming an arm the project never declared means the
            // arm export and the event export disagree.
            project.arm(info.arm_num)?;
            project.events.push(EventMetadata {
                unique_name: info.unique_event_name,
                label: info.event_name,
                arm_number: info.arm_num,
                ordering: idx as u32 + 1,
                repeatable: false,
                instruments: Vec::new(),
            });
        }
        tracing::debug!(events = project.events.len(), "Fetched events");
        Ok(())
    }
}

/// Attach instruments to events in mapping order, numbering them 1-based
/// within each event
fn apply_form_event_mappings(
    project: &mut ProjectMetadata,
    mappings: &[FormEventMapping],
) -> Result<()> {
    for mapping in mappings {
        project.instrument(&mapping.form)?;
        let event = project
            .events
            .iter_mut()
            .find(|e| e.unique_name == mapping.unique_event_name)
            .ok_or_else(|| {
                MirrorError::metadata_not_found(
                    MetadataEntity::Event,
                    &mapping.unique_event_name,
                )
            })?;
        let ordering = event.instruments.len() as u32 + 1;
        event.instruments.push(EventInstrumentMetadata {
            instrument: mapping.form.clone(),
            repeatable: false,
            ordering,
        });
    }
    Ok(())
}

/// Apply repeating-form/event designations to the model
///
/// Longitudinal: an entry without a form marks the whole event
/// repeatable; an entry with a form marks that event/instrument
/// association repeatable. Non-longitudinal: the entry marks the
/// instrument repeatable. Entries that reference nothing the model knows
/// are logged and ignored, since the feature is advisory for mirroring.
fn apply_repeating_designations(project: &mut ProjectMetadata, entries: &[RepeatingFormEvent]) {
    for entry in entries {
        if project.longitudinal {
            let Some(event_name) = entry.event_name.as_deref().filter(|n| !n.is_empty()) else {
                tracing::warn!(
                    "Repeating designation without an event in a longitudinal project; ignoring"
                );
                continue;
            };
            let Some(event) = project
                .events
                .iter_mut()
                .find(|e| e.unique_name == event_name)
            else {
                tracing::warn!(
                    event = event_name,
                    "Repeating designation names an unknown event; ignoring"
                );
                continue;
            };
            match entry.form_name.as_deref().filter(|f| !f.is_empty()) {
                None => event.repeatable = true,
                Some(form) => {
                    match event
                        .instruments
                        .iter_mut()
                        .find(|assoc| assoc.instrument == form)
                    {
                        Some(association) => association.repeatable = true,
                        None => tracing::warn!(
                            event = event_name,
                            instrument = form,
                            "Repeating instrument is not mapped to the event; ignoring"
                        ),
                    }
                }
            }
        } else {
            let Some(form) = entry.form_name.as_deref().filter(|f| !f.is_empty()) else {
                tracing::warn!(
                    "Repeating designation without a form in a non-longitudinal project; ignoring"
                );
                continue;
            };
            match project
                .instruments
                .iter_mut()
                .find(|i| i.unique_name == form)
            {
                Some(instrument) => instrument.repeatable = true,
                None => tracing::warn!(
                    instrument = form,
                    "Repeating designation names an unknown instrument; ignoring"
                ),
            }
        }
    }
}

/// Distribute data-dictionary fields onto their instruments, numbering
/// them 1-based per instrument. Fields whose type carries no column
/// consume no ordering slot.
fn apply_field_definitions(
    project: &mut ProjectMetadata,
    definitions: &[FieldDefinition],
) -> Result<()> {
    for def in definitions {
        let instrument = project
            .instruments
            .iter_mut()
            .find(|i| i.unique_name == def.form_name)
            .ok_or_else(|| {
                MirrorError::metadata_not_found(MetadataEntity::Instrument, &def.form_name)
            })?;
        let ordering = instrument.fields.len() as u32 + 1;
        match field_from_definition(def, ordering)? {
            Some(field) => instrument.fields.push(field),
            None => tracing::debug!(field = %def.field_name, "Field type carries no column; skipped"),
        }
    }
    Ok(())
}

/// Map one data-dictionary entry to field metadata
///
/// Returns `Ok(None)` for field types that produce no column (file
/// uploads).
///
/// # Errors
///
/// Returns [`MirrorError::Configuration`] for field types the mirror
/// does not support and [`MirrorError::Dictionary`] for an option list
/// that cannot be parsed.
fn field_from_definition(def: &FieldDefinition, ordering: u32) -> Result<Option<FieldMetadata>> {
    let field_type = match def.field_type.as_str() {
        "yesno" | "truefalse" => FieldType::Boolean,
        "checkbox" | "dropdown" | "radio" => FieldType::Text,
        "calc" => FieldType::Float,
        "descriptive" | "notes" | "sql" | "slider" => FieldType::Text,
        "text" => match def.text_validation_type_or_show_slider_number.as_str() {
            "number" => FieldType::Float,
            "integer" => FieldType::Integer,
            "date_mdy" | "date_dmy" | "date_ymd" => FieldType::Date,
            _ => FieldType::Text,
        },
        "file" => return Ok(None),
        other => {
            return Err(MirrorError::Configuration(format!(
                "Unsupported REDCap field type '{other}' on field '{}'",
                def.field_name
            )))
        }
    };

    let display_lookup = match def.field_type.as_str() {
        "checkbox" | "dropdown" | "radio" => {
            parse_display_lookup(&def.field_name, &def.select_choices_or_calculations)?
        }
        _ => BTreeMap::new(),
    };

    Ok(Some(FieldMetadata {
        unique_name: def.field_name.clone(),
        column_override: None,
        label: def.field_label.clone(),
        ordering,
        field_type,
        display_lookup,
        multi_valued: def.field_type == "checkbox",
    }))
}

/// Parse a REDCap option list (`1, Label | 2, Other label`) into a
/// key → label map. Keys are trimmed and lower-cased; labels keep any
/// embedded commas.
fn parse_display_lookup(field_name: &str, raw: &str) -> Result<BTreeMap<String, String>> {
    let mut lookup = BTreeMap::new();
    for piece in raw.split('|') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let (key, label) = piece.split_once(',').ok_or_else(|| {
            MirrorError::Dictionary(format!(
                "Field '{field_name}' has a malformed option '{piece}' (expected 'key, label')"
            ))
        })?;
        lookup.insert(key.trim().to_lowercase(), label.trim().to_string());
    }
    Ok(lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn definition(field_type: &str, validation: &str, choices: &str) -> FieldDefinition {
        FieldDefinition {
            field_name: "sample_field".to_string(),
            form_name: "demographics".to_string(),
            field_type: field_type.to_string(),
            field_label: "Sample field".to_string(),
            select_choices_or_calculations: choices.to_string(),
            text_validation_type_or_show_slider_number: validation.to_string(),
        }
    }

    fn instrument(unique_name: &str) -> InstrumentMetadata {
        InstrumentMetadata {
            unique_name: unique_name.to_string(),
            table_override: None,
            label: unique_name.to_string(),
            repeatable: false,
            fields: Vec::new(),
        }
    }

    fn event(unique_name: &str, ordering: u32) -> EventMetadata {
        EventMetadata {
            unique_name: unique_name.to_string(),
            label: unique_name.to_string(),
            arm_number: 1,
            ordering,
            repeatable: false,
            instruments: Vec::new(),
        }
    }

    fn longitudinal_project() -> ProjectMetadata {
        ProjectMetadata {
            name: ProjectName::new("demo").unwrap(),
            title: "Demo".to_string(),
            primary_key_field: "study_id".to_string(),
            longitudinal: true,
            multiple_arms: false,
            arms: vec![ArmMetadata {
                arm_number: 1,
                name: "Arm 1".to_string(),
            }],
            events: vec![event("baseline_arm_1", 1), event("followup_arm_1", 2)],
            instruments: vec![instrument("demographics"), instrument("visit_log")],
        }
    }

    fn flat_project() -> ProjectMetadata {
        ProjectMetadata {
            name: ProjectName::new("demo").unwrap(),
            title: "Demo".to_string(),
            primary_key_field: "study_id".to_string(),
            longitudinal: false,
            multiple_arms: false,
            arms: vec![ArmMetadata {
                arm_number: 1,
                name: "Arm 1".to_string(),
            }],
            events: Vec::new(),
            instruments: vec![instrument("demographics"), instrument("visit_log")],
        }
    }

    fn mapping(event: &str, form: &str) -> FormEventMapping {
        FormEventMapping {
            unique_event_name: event.to_string(),
            form: form.to_string(),
        }
    }

    fn repeating(event: Option<&str>, form: Option<&str>) -> RepeatingFormEvent {
        RepeatingFormEvent {
            event_name: event.map(str::to_string),
            form_name: form.map(str::to_string),
        }
    }

    #[test_case("yesno", "", FieldType::Boolean; "yesno is boolean")]
    #[test_case("truefalse", "", FieldType::Boolean; "truefalse is boolean")]
    #[test_case("calc", "", FieldType::Float; "calc is float")]
    #[test_case("notes", "", FieldType::Text; "notes is text")]
    #[test_case("descriptive", "", FieldType::Text; "descriptive is text")]
    #[test_case("sql", "", FieldType::Text; "sql is text")]
    #[test_case("slider", "", FieldType::Text; "slider is text")]
    #[test_case("text", "", FieldType::Text; "unvalidated text is text")]
    #[test_case("text", "number", FieldType::Float; "number validation is float")]
    #[test_case("text", "integer", FieldType::Integer; "integer validation is integer")]
    #[test_case("text", "date_mdy", FieldType::Date; "date mdy validation is date")]
    #[test_case("text", "date_dmy", FieldType::Date; "date dmy validation is date")]
    #[test_case("text", "date_ymd", FieldType::Date; "date ymd validation is date")]
    #[test_case("text", "email", FieldType::Text; "other validation is text")]
    fn test_scalar_type_mapping(field_type: &str, validation: &str, expected: FieldType) {
        let field = field_from_definition(&definition(field_type, validation, ""), 3)
            .unwrap()
            .unwrap();
        assert_eq!(field.field_type, expected);
        assert_eq!(field.ordering, 3);
        assert!(!field.multi_valued);
        assert!(field.display_lookup.is_empty());
    }

    #[test]
    fn test_calc_expression_is_not_parsed_as_options() {
        let field = field_from_definition(&definition("calc", "", "[weight]/([height]*[height])"), 1)
            .unwrap()
            .unwrap();
        assert!(field.display_lookup.is_empty());
    }

    #[test]
    fn test_checkbox_is_multi_valued_with_lookup() {
        let field = field_from_definition(&definition("checkbox", "", "1, Red | 2, Blue"), 1)
            .unwrap()
            .unwrap();
        assert_eq!(field.field_type, FieldType::Text);
        assert!(field.multi_valued);
        assert_eq!(field.display_lookup.len(), 2);
        assert_eq!(field.display_lookup["1"], "Red");
        assert_eq!(field.display_lookup["2"], "Blue");
    }

    #[test]
    fn test_dropdown_keys_are_trimmed_and_lowercased() {
        let field = field_from_definition(&definition("dropdown", "", " A , Alpha | B ,Beta"), 1)
            .unwrap()
            .unwrap();
        assert!(!field.multi_valued);
        assert_eq!(field.display_lookup["a"], "Alpha");
        assert_eq!(field.display_lookup["b"], "Beta");
    }

    #[test]
    fn test_option_label_keeps_embedded_commas() {
        let lookup = parse_display_lookup("status", "1, Alive, well | 2, Deceased").unwrap();
        assert_eq!(lookup["1"], "Alive, well");
    }

    #[test]
    fn test_empty_option_pieces_are_skipped() {
        let lookup = parse_display_lookup("status", "1, Yes || 2, No | ").unwrap();
        assert_eq!(lookup.len(), 2);
    }

    #[test]
    fn test_malformed_option_is_rejected() {
        let err = parse_display_lookup("status", "1, Yes | stray").unwrap_err();
        assert!(matches!(err, MirrorError::Dictionary(_)), "got: {err}");
    }

    #[test]
    fn test_file_field_produces_no_column() {
        assert!(field_from_definition(&definition("file", "", ""), 1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unknown_field_type_is_rejected() {
        let err = field_from_definition(&definition("signature", "", ""), 1).unwrap_err();
        assert!(matches!(err, MirrorError::Configuration(_)), "got: {err}");
    }

    #[test]
    fn test_mappings_number_instruments_per_event() {
        let mut project = longitudinal_project();
        let mappings = vec![
            mapping("baseline_arm_1", "demographics"),
            mapping("baseline_arm_1", "visit_log"),
            mapping("followup_arm_1", "visit_log"),
        ];
        apply_form_event_mappings(&mut project, &mappings).unwrap();

        let baseline = &project.events[0];
        assert_eq!(baseline.instruments.len(), 2);
        assert_eq!(baseline.instruments[0].instrument, "demographics");
        assert_eq!(baseline.instruments[0].ordering, 1);
        assert_eq!(baseline.instruments[1].ordering, 2);

        let followup = &project.events[1];
        assert_eq!(followup.instruments.len(), 1);
        assert_eq!(followup.instruments[0].ordering, 1);
    }

    #[test]
    fn test_mapping_to_unknown_event_is_rejected() {
        let mut project = longitudinal_project();
        let err = apply_form_event_mappings(&mut project, &[mapping("ghost_arm_1", "visit_log")])
            .unwrap_err();
        assert!(matches!(err, MirrorError::MetadataNotFound { .. }), "got: {err}");
    }

    #[test]
    fn test_mapping_to_unknown_instrument_is_rejected() {
        let mut project = longitudinal_project();
        let err = apply_form_event_mappings(&mut project, &[mapping("baseline_arm_1", "ghost")])
            .unwrap_err();
        assert!(matches!(err, MirrorError::MetadataNotFound { .. }), "got: {err}");
    }

    #[test]
    fn test_repeating_marks_event_and_association() {
        let mut project = longitudinal_project();
        apply_form_event_mappings(
            &mut project,
            &[mapping("baseline_arm_1", "visit_log")],
        )
        .unwrap();

        apply_repeating_designations(
            &mut project,
            &[
                repeating(Some("followup_arm_1"), None),
                repeating(Some("baseline_arm_1"), Some("visit_log")),
            ],
        );

        assert!(project.events[1].repeatable);
        assert!(!project.events[0].repeatable);
        assert!(project.events[0].instruments[0].repeatable);
    }

    #[test]
    fn test_repeating_unmapped_association_is_ignored() {
        let mut project = longitudinal_project();
        apply_repeating_designations(
            &mut project,
            &[repeating(Some("baseline_arm_1"), Some("visit_log"))],
        );
        assert!(!project.events[0].repeatable);
        assert!(project.events[0].instruments.is_empty());
    }

    #[test]
    fn test_repeating_marks_flat_instrument() {
        let mut project = flat_project();
        apply_repeating_designations(&mut project, &[repeating(None, Some("visit_log"))]);
        assert!(project.instruments[1].repeatable);
        assert!(!project.instruments[0].repeatable);
    }

    #[test]
    fn test_field_definitions_number_per_instrument_and_skip_files() {
        let mut project = flat_project();
        let mut consent = definition("file", "", "");
        consent.field_name = "consent_scan".to_string();
        let mut age = definition("text", "integer", "");
        age.field_name = "age".to_string();
        let mut visit_date = definition("text", "date_ymd", "");
        visit_date.field_name = "visit_date".to_string();
        visit_date.form_name = "visit_log".to_string();

        apply_field_definitions(
            &mut project,
            &[definition("text", "", ""), consent, age, visit_date],
        )
        .unwrap();

        let demographics = &project.instruments[0];
        assert_eq!(demographics.fields.len(), 2);
        assert_eq!(demographics.fields[0].ordering, 1);
        assert_eq!(demographics.fields[1].unique_name, "age");
        assert_eq!(demographics.fields[1].ordering, 2);

        let visit_log = &project.instruments[1];
        assert_eq!(visit_log.fields.len(), 1);
        assert_eq!(visit_log.fields[0].ordering, 1);
    }

    #[test]
    fn test_field_on_unknown_instrument_is_rejected() {
        let mut project = flat_project();
        let mut orphan = definition("text", "", "");
        orphan.form_name = "ghost_form".to_string();
        let err = apply_field_definitions(&mut project, &[orphan]).unwrap_err();
        assert!(matches!(err, MirrorError::MetadataNotFound { .. }), "got: {err}");
    }
}
