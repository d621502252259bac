//! Dictionary persistence and schema generation tests
//!
//! The metadata model crosses from `discover` to `load` as a JSON
//! dictionary on disk. These tests walk that seam: save a model, load it
//! back, and check that schema generation over the reloaded model yields
//! the expected tables, including the hand-edited override path the
//! dictionary file exists to support.

use capmirror::core::dictionary::ProjectDictionary;
use capmirror::core::schema::{ProjectSchema, TableKind};
use capmirror::domain::metadata::{
    ArmMetadata, EventInstrumentMetadata, EventMetadata, FieldMetadata, FieldType,
    InstrumentMetadata, ProjectMetadata,
};
use capmirror::domain::ProjectName;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tempfile::TempDir;

fn field(name: &str, ordering: u32, field_type: FieldType) -> FieldMetadata {
    FieldMetadata {
        unique_name: name.to_string(),
        column_override: None,
        label: name.to_string(),
        ordering,
        field_type,
        display_lookup: BTreeMap::new(),
        multi_valued: false,
    }
}

fn checkbox_field(name: &str, ordering: u32, options: &[(&str, &str)]) -> FieldMetadata {
    let mut f = field(name, ordering, FieldType::Text);
    f.multi_valued = true;
    for (key, label) in options {
        f.display_lookup
            .insert((*key).to_string(), (*label).to_string());
    }
    f
}

fn flat_project() -> ProjectMetadata {
    ProjectMetadata {
        name: ProjectName::new("demo").unwrap(),
        title: "Demo Registry".to_string(),
        primary_key_field: "study_id".to_string(),
        longitudinal: false,
        multiple_arms: false,
        arms: vec![ArmMetadata {
            arm_number: 1,
            name: "Arm 1".to_string(),
        }],
        events: Vec::new(),
        instruments: vec![
            InstrumentMetadata {
                unique_name: "demographics".to_string(),
                table_override: None,
                label: "Demographics".to_string(),
                repeatable: false,
                fields: vec![
                    field("age", 1, FieldType::Integer),
                    checkbox_field("race", 2, &[("1", "White"), ("2", "Asian")]),
                ],
            },
            InstrumentMetadata {
                unique_name: "visit_log".to_string(),
                table_override: None,
                label: "Visit log".to_string(),
                repeatable: true,
                fields: vec![
                    field("weight", 1, FieldType::Float),
                    field("visit_date", 2, FieldType::Date),
                ],
            },
        ],
    }
}

fn long_project() -> ProjectMetadata {
    let mut project = flat_project();
    project.name = ProjectName::new("trial").unwrap();
    project.longitudinal = true;
    project.instruments[1].repeatable = false;
    project.events = vec![EventMetadata {
        unique_name: "baseline_arm_1".to_string(),
        label: "Baseline".to_string(),
        arm_number: 1,
        ordering: 1,
        repeatable: false,
        instruments: vec![EventInstrumentMetadata {
            instrument: "demographics".to_string(),
            repeatable: false,
            ordering: 1,
        }],
    }];
    project
}

fn save_and_load(project: ProjectMetadata) -> (TempDir, ProjectDictionary) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path: PathBuf = dir.path().join("dictionary.json");
    ProjectDictionary::new(project)
        .save(&path)
        .expect("Failed to save dictionary");
    let loaded = ProjectDictionary::load(&path).expect("Failed to load dictionary");
    (dir, loaded)
}

#[test]
fn test_reloaded_dictionary_generates_the_same_schema() {
    let project = flat_project();
    let direct = ProjectSchema::generate(&project);

    let (_dir, loaded) = save_and_load(project);
    let via_disk = ProjectSchema::generate(&loaded.project);

    assert_eq!(direct, via_disk);
    assert_eq!(direct.create_statements(), via_disk.create_statements());

    let names: Vec<&str> = via_disk.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "project_root",
            "demographics",
            "visit_log",
            "demographics_race_lookup"
        ]
    );

    let statements = via_disk.create_statements();
    assert!(statements[0].starts_with("CREATE TABLE \"demo\".\"project_root\""));
    assert!(statements[0].contains("\"study_id\" VARCHAR(255) PRIMARY KEY"));
    assert!(statements[1].contains(
        "\"project_root_id\" VARCHAR(255) NOT NULL REFERENCES \"demo\".\"project_root\" (\"study_id\")"
    ));
}

#[test]
fn test_hand_edited_overrides_reach_the_generated_schema() {
    // Table and column overrides are the supported dictionary edits;
    // the reloaded model must carry them into generation.
    let mut project = flat_project();
    project.instruments[0].table_override = Some("baseline_demographics".to_string());
    project.instruments[0].fields[0].column_override = Some("age_years".to_string());

    let (_dir, loaded) = save_and_load(project);
    let schema = ProjectSchema::generate(&loaded.project);

    assert!(schema.table("demographics").is_none());
    let table = schema.table("baseline_demographics").expect("table missing");
    assert_eq!(table.kind, TableKind::Instrument);
    assert!(table.column("age").is_none());
    assert!(table.column("age_years").is_some());

    // Lookup naming follows the overridden table name.
    let lookup = schema
        .table("baseline_demographics_race_lookup")
        .expect("lookup table missing");
    let fk = lookup.column("baseline_demographics_id").expect("fk missing");
    assert_eq!(
        fk.references.as_ref().map(|r| r.table.as_str()),
        Some("baseline_demographics")
    );
}

#[test]
fn test_longitudinal_dictionary_generates_the_event_table() {
    let (_dir, loaded) = save_and_load(long_project());
    let schema = ProjectSchema::generate(&loaded.project);

    let kinds: Vec<TableKind> = schema.tables.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TableKind::Root,
            TableKind::Event,
            TableKind::Instrument,
            TableKind::Instrument,
            TableKind::Lookup
        ]
    );

    let event = schema.table("redcap_event").expect("event table missing");
    let root_fk = event.column("project_root_id").expect("fk missing");
    assert_eq!(
        root_fk.references.as_ref().map(|r| r.column.as_str()),
        Some("study_id")
    );

    // Instruments hang off events, not the root, in longitudinal
    // projects.
    let demographics = schema.table("demographics").expect("table missing");
    assert!(demographics.column("project_root_id").is_none());
    let event_fk = demographics.column("redcap_event_id").expect("fk missing");
    assert_eq!(
        event_fk.references.as_ref().map(|r| r.table.as_str()),
        Some("redcap_event")
    );

    let statements = schema.create_statements();
    assert!(statements[1].starts_with("CREATE TABLE \"trial\".\"redcap_event\""));
}
