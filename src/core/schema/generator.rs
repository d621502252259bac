//! Schema generation from project metadata
//!
//! [`ProjectSchema::generate`] is pure: it reads the metadata model and
//! produces table specs in dependency order (root → event → instrument →
//! lookup) without touching the store. Running it twice over the same
//! metadata yields identical output, which keeps reloads reproducible.

use crate::core::schema::tables::{
    lookup_fk_column, lookup_table_name, ColumnSpec, ColumnType, TableKind, TableSpec,
    EVENT_FK_COLUMN, EVENT_TABLE, REPEAT_INSTANCE_COLUMN, ROOT_FK_COLUMN, ROOT_TABLE,
};
use crate::domain::ids::ProjectName;
use crate::domain::metadata::{FieldType, InstrumentMetadata, ProjectMetadata};
use serde::{Deserialize, Serialize};

/// Map a field's declared value type to its column type
fn map_field_type(field_type: FieldType) -> ColumnType {
    match field_type {
        FieldType::Text => ColumnType::Text,
        FieldType::Integer => ColumnType::Integer,
        FieldType::Float => ColumnType::Float,
        FieldType::Date => ColumnType::Date,
        FieldType::Boolean => ColumnType::Boolean,
    }
}

/// The generated relational schema for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSchema {
    /// Namespace (PostgreSQL schema) holding every table
    pub namespace: ProjectName,

    /// Table specs in dependency order
    pub tables: Vec<TableSpec>,
}

impl ProjectSchema {
    /// Derive the schema description for a project
    ///
    /// Table order is root, then the event table for longitudinal
    /// projects, then one table per instrument (alphabetic, following the
    /// normalized metadata), then every lookup table.
    pub fn generate(project: &ProjectMetadata) -> Self {
        let mut tables = Vec::new();

        tables.push(Self::root_table(project));
        if project.longitudinal {
            tables.push(Self::event_table(project));
        }
        for instrument in &project.instruments {
            tables.push(Self::instrument_table(project, instrument));
        }
        for instrument in &project.instruments {
            for field in instrument.multi_valued_fields() {
                let instrument_table = instrument.table_name();
                tables.push(TableSpec {
                    name: lookup_table_name(instrument_table, field.column_name()),
                    kind: TableKind::Lookup,
                    columns: vec![
                        ColumnSpec::primary_key("id", ColumnType::BigInt),
                        ColumnSpec::foreign_key(
                            lookup_fk_column(instrument_table),
                            ColumnType::BigInt,
                            instrument_table,
                            "id",
                        ),
                        ColumnSpec::data(field.column_name(), ColumnType::Text),
                        ColumnSpec::data(field.display_column_name(), ColumnType::Text),
                    ],
                });
            }
        }

        ProjectSchema {
            namespace: project.name.clone(),
            tables,
        }
    }

    fn root_table(project: &ProjectMetadata) -> TableSpec {
        TableSpec {
            name: ROOT_TABLE.to_string(),
            kind: TableKind::Root,
            columns: vec![
                ColumnSpec::primary_key(&project.primary_key_field, ColumnType::VarChar(255)),
                ColumnSpec::data(
                    format!("{}_display", project.primary_key_field),
                    ColumnType::Text,
                ),
            ],
        }
    }

    fn event_table(project: &ProjectMetadata) -> TableSpec {
        let mut unique_name = ColumnSpec::data("event_unique_name", ColumnType::VarChar(255));
        unique_name.nullable = false;
        let mut label = ColumnSpec::data("event_label", ColumnType::Text);
        label.nullable = false;
        let mut arm = ColumnSpec::data("arm_number", ColumnType::Integer);
        arm.nullable = false;

        TableSpec {
            name: EVENT_TABLE.to_string(),
            kind: TableKind::Event,
            columns: vec![
                ColumnSpec::primary_key("id", ColumnType::BigInt),
                ColumnSpec::foreign_key(
                    ROOT_FK_COLUMN,
                    ColumnType::VarChar(255),
                    ROOT_TABLE,
                    &project.primary_key_field,
                ),
                unique_name,
                label,
                arm,
                ColumnSpec::data(REPEAT_INSTANCE_COLUMN, ColumnType::Integer),
            ],
        }
    }

    fn instrument_table(project: &ProjectMetadata, instrument: &InstrumentMetadata) -> TableSpec {
        let owner = if project.longitudinal {
            ColumnSpec::foreign_key(EVENT_FK_COLUMN, ColumnType::BigInt, EVENT_TABLE, "id")
        } else {
            ColumnSpec::foreign_key(
                ROOT_FK_COLUMN,
                ColumnType::VarChar(255),
                ROOT_TABLE,
                &project.primary_key_field,
            )
        };

        let mut columns = vec![
            ColumnSpec::primary_key("id", ColumnType::BigInt),
            owner,
            ColumnSpec::data(REPEAT_INSTANCE_COLUMN, ColumnType::Integer),
        ];
        for field in instrument.scalar_fields() {
            columns.push(ColumnSpec::data(
                field.column_name(),
                map_field_type(field.field_type),
            ));
            if field.has_display_lookup() {
                columns.push(ColumnSpec::data(
                    field.display_column_name(),
                    ColumnType::Text,
                ));
            }
        }

        TableSpec {
            name: instrument.table_name().to_string(),
            kind: TableKind::Instrument,
            columns,
        }
    }

    /// Look up one table spec by name
    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Render every CREATE TABLE statement, in dependency order
    pub fn create_statements(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|t| t.create_sql(self.namespace.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::ProjectName;
    use crate::domain::metadata::{
        ArmMetadata, EventInstrumentMetadata, EventMetadata, FieldMetadata, InstrumentMetadata,
    };
    use std::collections::BTreeMap;

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

    fn sample_project(longitudinal: bool) -> ProjectMetadata {
        let mut sex = field("sex", 2, FieldType::Text);
        sex.display_lookup.insert("1".to_string(), "Male".to_string());
        sex.display_lookup
            .insert("2".to_string(), "Female".to_string());

        let mut race = field("race", 3, FieldType::Text);
        race.multi_valued = true;
        race.display_lookup
            .insert("1".to_string(), "White".to_string());
        race.display_lookup
            .insert("2".to_string(), "Black".to_string());

        let mut project = ProjectMetadata {
            name: ProjectName::new("demo").unwrap(),
            title: "Demo".to_string(),
            primary_key_field: "study_id".to_string(),
            longitudinal,
            multiple_arms: false,
            arms: vec![ArmMetadata {
                arm_number: 1,
                name: "Arm 1".to_string(),
            }],
            events: vec![],
            instruments: vec![
                InstrumentMetadata {
                    unique_name: "demographics".to_string(),
                    table_override: None,
                    label: "Demographics".to_string(),
                    repeatable: false,
                    fields: vec![
                        field("age", 1, FieldType::Integer),
                        sex,
                        race,
                        field("dob", 4, FieldType::Date),
                    ],
                },
                InstrumentMetadata {
                    unique_name: "visit".to_string(),
                    table_override: None,
                    label: "Visit".to_string(),
                    repeatable: !longitudinal,
                    fields: vec![field("weight", 1, FieldType::Float)],
                },
            ],
        };
        if longitudinal {
            project.events.push(EventMetadata {
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
            });
        }
        project.normalize();
        project
    }

    #[test]
    fn test_generation_is_deterministic() {
        let project = sample_project(false);
        let first = ProjectSchema::generate(&project);
        let second = ProjectSchema::generate(&project);
        assert_eq!(first, second);
        assert_eq!(first.create_statements(), second.create_statements());
    }

    #[test]
    fn test_non_longitudinal_layout() {
        let schema = ProjectSchema::generate(&sample_project(false));
        let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "project_root",
                "demographics",
                "visit",
                "demographics_race_lookup"
            ]
        );

        let demographics = schema.table("demographics").unwrap();
        let fk = demographics.column("project_root_id").unwrap();
        assert_eq!(
            fk.references.as_ref().unwrap().table,
            "project_root".to_string()
        );
        assert_eq!(fk.references.as_ref().unwrap().column, "study_id");
        // Multi-valued fields never become instrument columns
        assert!(demographics.column("race").is_none());
        assert!(demographics.column("sex_display_value").is_some());
        assert!(demographics.column("age").is_some());
    }

    #[test]
    fn test_longitudinal_layout() {
        let schema = ProjectSchema::generate(&sample_project(true));
        let event = schema.table("redcap_event").unwrap();
        assert_eq!(event.kind, TableKind::Event);
        assert!(event.column("event_unique_name").is_some());
        assert!(event.column("arm_number").is_some());
        assert!(event.column("redcap_repeat_instance").is_some());

        let demographics = schema.table("demographics").unwrap();
        assert!(demographics.column("project_root_id").is_none());
        let fk = demographics.column("redcap_event_id").unwrap();
        assert_eq!(fk.references.as_ref().unwrap().table, "redcap_event");
    }

    #[test]
    fn test_lookup_table_shape() {
        let schema = ProjectSchema::generate(&sample_project(false));
        let lookup = schema.table("demographics_race_lookup").unwrap();
        assert_eq!(lookup.kind, TableKind::Lookup);
        assert!(lookup.column("id").is_some());
        let fk = lookup.column("demographics_id").unwrap();
        assert_eq!(fk.column_type, ColumnType::BigInt);
        assert_eq!(fk.references.as_ref().unwrap().table, "demographics");
        assert!(lookup.column("race").is_some());
        assert!(lookup.column("race_display_value").is_some());
    }

    #[test]
    fn test_column_types_follow_field_types() {
        let schema = ProjectSchema::generate(&sample_project(false));
        let demographics = schema.table("demographics").unwrap();
        assert_eq!(
            demographics.column("age").unwrap().column_type,
            ColumnType::Integer
        );
        assert_eq!(
            demographics.column("dob").unwrap().column_type,
            ColumnType::Date
        );
        let visit = schema.table("visit").unwrap();
        assert_eq!(
            visit.column("weight").unwrap().column_type,
            ColumnType::Float
        );
    }

    #[test]
    fn test_tables_in_dependency_order() {
        let schema = ProjectSchema::generate(&sample_project(true));
        let kinds: Vec<TableKind> = schema.tables.iter().map(|t| t.kind).collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
    }

    #[test]
    fn test_root_table_uses_primary_key_field_name() {
        let mut project = sample_project(false);
        project.primary_key_field = "record_id".to_string();
        let schema = ProjectSchema::generate(&project);
        let root = schema.table("project_root").unwrap();
        assert!(root.column("record_id").unwrap().primary_key);
        assert!(root.column("record_id_display").is_some());
    }
}
