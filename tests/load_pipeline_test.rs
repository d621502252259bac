//! End-to-end load pipeline tests
//!
//! Drive the load coordinator against a mock REDCap API and the in-memory
//! target store, then inspect the rows and run records the pipeline left
//! behind. Mock responses are matched on their form body, so the tests
//! also pin the exact API parameters each phase sends.

use capmirror::adapters::database::{MemoryStore, StoredRow};
use capmirror::adapters::redcap::RedcapClient;
use capmirror::config::{secret_string, RedcapConfig};
use capmirror::core::load::LoadCoordinator;
use capmirror::core::runlog::{RunDirection, RunStatus};
use capmirror::domain::metadata::{
    ArmMetadata, EventInstrumentMetadata, EventMetadata, FieldMetadata, FieldType,
    InstrumentMetadata, ProjectMetadata,
};
use capmirror::domain::{CellValue, ProjectName, RowOwner};
use chrono::NaiveDate;
use mockito::Matcher;
use std::collections::BTreeMap;
use std::sync::Arc;

fn client_for(server: &mockito::ServerGuard) -> Arc<RedcapClient> {
    let config = RedcapConfig {
        api_url: server.url(),
        api_token: secret_string("TESTTOKEN".to_string()),
        timeout_seconds: 5,
        verify_ssl: true,
    };
    Arc::new(RedcapClient::new(&config).unwrap())
}

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

fn select_field(name: &str, ordering: u32, options: &[(&str, &str)]) -> FieldMetadata {
    let mut f = field(name, ordering, FieldType::Text);
    for (key, label) in options {
        f.display_lookup
            .insert((*key).to_string(), (*label).to_string());
    }
    f
}

fn checkbox_field(name: &str, ordering: u32, options: &[(&str, &str)]) -> FieldMetadata {
    let mut f = select_field(name, ordering, options);
    f.multi_valued = true;
    f
}

/// Non-longitudinal registry: a base instrument and a repeating one
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
                    select_field("sex", 2, &[("1", "Male"), ("2", "Female")]),
                    checkbox_field("race", 3, &[("1", "White"), ("2", "Asian")]),
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

/// Longitudinal variant: demographics at baseline, visits in a repeating
/// monthly event
fn long_project() -> ProjectMetadata {
    let mut project = flat_project();
    project.longitudinal = true;
    project.instruments[1].repeatable = false;
    project.events = vec![
        EventMetadata {
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
        },
        EventMetadata {
            unique_name: "monthly_arm_1".to_string(),
            label: "Monthly".to_string(),
            arm_number: 1,
            ordering: 2,
            repeatable: true,
            instruments: vec![EventInstrumentMetadata {
                instrument: "visit_log".to_string(),
                repeatable: false,
                ordering: 1,
            }],
        },
    ];
    project
}

/// Matcher for the subject-list export: the primary-key field filter
fn subject_list_matcher(primary_key: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("content".into(), "record".into()),
        Matcher::UrlEncoded("fields[0]".into(), primary_key.into()),
    ])
}

/// Matcher for one subject's record export
fn subject_records_matcher(subject: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("content".into(), "record".into()),
        Matcher::UrlEncoded("records[0]".into(), subject.into()),
    ])
}

fn instrument_row(row: &StoredRow) -> &capmirror::domain::InstrumentRow {
    match row {
        StoredRow::Instrument(inner) => inner,
        other => panic!("expected an instrument row, got {other:?}"),
    }
}

#[tokio::test]
async fn test_flat_load_end_to_end() {
    let mut server = mockito::Server::new_async().await;

    // The subject list repeats S1; the pipeline must deduplicate it.
    let list_mock = server
        .mock("POST", "/")
        .match_body(subject_list_matcher("study_id"))
        .with_status(200)
        .with_body(r#"[{"study_id": "S1"}, {"study_id": "S2"}, {"study_id": "S1"}]"#)
        .create_async()
        .await;

    let s1_mock = server
        .mock("POST", "/")
        .match_body(subject_records_matcher("S1"))
        .with_status(200)
        .with_body(
            r#"[
                {"study_id": "S1", "redcap_repeat_instrument": "", "redcap_repeat_instance": "",
                 "age": "34", "sex": "2", "race___1": "1", "race___2": "0"},
                {"study_id": "S1", "redcap_repeat_instrument": "visit_log",
                 "redcap_repeat_instance": "1", "weight": "70.5", "visit_date": "2024-03-01"}
            ]"#,
        )
        .create_async()
        .await;

    let s2_mock = server
        .mock("POST", "/")
        .match_body(subject_records_matcher("S2"))
        .with_status(200)
        .with_body(r#"[{"study_id": "S2", "age": "41"}]"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let store = Arc::new(MemoryStore::new());
    let coordinator = LoadCoordinator::new(flat_project(), Vec::new(), client, store.clone());

    let summary = coordinator.execute_load().await.expect("load failed");

    list_mock.assert_async().await;
    s1_mock.assert_async().await;
    s2_mock.assert_async().await;

    // Verify the summary
    assert_eq!(summary.project, "demo");
    assert_eq!(summary.subjects_loaded, 2);
    assert_eq!(summary.records_processed, 3);
    assert_eq!(summary.rows_written, 6);
    assert_eq!(summary.query_count, 3);
    assert!(summary.is_clean());

    // Verify the materialized tables
    let tables = store.tables("demo").await;
    assert_eq!(
        tables,
        vec![
            "demographics",
            "demographics_race_lookup",
            "project_root",
            "visit_log"
        ]
    );

    // Verify root rows, in first-seen subject order
    let roots: Vec<String> = store
        .table_rows("demo", "project_root")
        .await
        .iter()
        .map(|row| match row {
            StoredRow::Root(inner) => inner.subject.as_str().to_string(),
            other => panic!("expected a root row, got {other:?}"),
        })
        .collect();
    assert_eq!(roots, vec!["S1", "S2"]);

    // Verify demographics values and display resolution
    let demographics = store.table_rows("demo", "demographics").await;
    assert_eq!(demographics.len(), 2);
    let s1 = instrument_row(&demographics[0]);
    assert_eq!(s1.values.get("age"), Some(&CellValue::Integer(34)));
    assert_eq!(s1.values.get("sex"), Some(&CellValue::Text("2".to_string())));
    assert_eq!(
        s1.values.get("sex_display_value"),
        Some(&CellValue::Text("Female".to_string()))
    );
    assert!(matches!(s1.owner, RowOwner::Root(ref subject) if subject.as_str() == "S1"));
    let s2 = instrument_row(&demographics[1]);
    assert_eq!(s2.values.get("age"), Some(&CellValue::Integer(41)));
    assert!(!s2.values.contains_key("sex"));

    // Verify the repeating instrument row
    let visits = store.table_rows("demo", "visit_log").await;
    assert_eq!(visits.len(), 1);
    let visit = instrument_row(&visits[0]);
    assert_eq!(visit.repeat_instance, Some(1));
    assert_eq!(visit.values.get("weight"), Some(&CellValue::Float(70.5)));
    assert_eq!(
        visit.values.get("visit_date"),
        Some(&CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
    );

    // Verify the checkbox selection landed in the lookup table,
    // referencing S1's demographics row
    let lookups = store.table_rows("demo", "demographics_race_lookup").await;
    assert_eq!(lookups.len(), 1);
    match &lookups[0] {
        StoredRow::Lookup(lookup) => {
            assert_eq!(lookup.option_key, "1");
            assert_eq!(lookup.display_value, "White");
            assert_eq!(Some(lookup.instrument_id), s1.id);
        }
        other => panic!("expected a lookup row, got {other:?}"),
    }

    // Verify the run record
    let runs = store.runs().await;
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.id, summary.run_id);
    assert_eq!(run.direction, RunDirection::Download);
    assert_eq!(run.status, RunStatus::EtlCompleted);
    assert_eq!(run.query_count, Some(3));
    assert_eq!(run.instruments_loaded, None);
    assert_eq!(run.comment, None);
    assert!(run.ended_at.is_some());
    assert_eq!(run.loaded_summary(), "all");
}

#[tokio::test]
async fn test_longitudinal_load_builds_event_rows() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/")
        .match_body(subject_list_matcher("study_id"))
        .with_status(200)
        .with_body(r#"[{"study_id": "S1"}]"#)
        .create_async()
        .await;

    // One baseline record plus two instances of the repeating monthly
    // event.
    server
        .mock("POST", "/")
        .match_body(subject_records_matcher("S1"))
        .with_status(200)
        .with_body(
            r#"[
                {"study_id": "S1", "redcap_event_name": "baseline_arm_1", "age": "34"},
                {"study_id": "S1", "redcap_event_name": "monthly_arm_1",
                 "redcap_repeat_instance": "1", "weight": "70"},
                {"study_id": "S1", "redcap_event_name": "monthly_arm_1",
                 "redcap_repeat_instance": "2", "weight": "71"}
            ]"#,
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let store = Arc::new(MemoryStore::new());
    let coordinator = LoadCoordinator::new(long_project(), Vec::new(), client, store.clone());

    let summary = coordinator.execute_load().await.expect("load failed");

    // 1 root + 3 events + 1 demographics + 2 visits
    assert_eq!(summary.rows_written, 7);
    assert_eq!(summary.records_processed, 3);

    let events = store.table_rows("demo", "redcap_event").await;
    assert_eq!(events.len(), 3);
    let described: Vec<(String, Option<i32>)> = events
        .iter()
        .map(|row| match row {
            StoredRow::Event(inner) => {
                (inner.event_unique_name.clone(), inner.repeat_instance)
            }
            other => panic!("expected an event row, got {other:?}"),
        })
        .collect();
    assert_eq!(
        described,
        vec![
            ("baseline_arm_1".to_string(), None),
            ("monthly_arm_1".to_string(), Some(1)),
            ("monthly_arm_1".to_string(), Some(2)),
        ]
    );

    // Instrument rows hang off their event rows by surrogate id
    let monthly_ids: Vec<i64> = events
        .iter()
        .filter_map(|row| match row {
            StoredRow::Event(inner) if inner.event_unique_name == "monthly_arm_1" => inner.id,
            _ => None,
        })
        .collect();
    let visit_owners: Vec<i64> = store
        .table_rows("demo", "visit_log")
        .await
        .iter()
        .map(|row| match instrument_row(row).owner {
            RowOwner::Event(id) => id,
            ref other => panic!("expected an event owner, got {other:?}"),
        })
        .collect();
    assert_eq!(visit_owners, monthly_ids);
}

#[tokio::test]
async fn test_instrument_allow_list_restricts_fetch_and_run_record() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/")
        .match_body(subject_list_matcher("study_id"))
        .with_status(200)
        .with_body(r#"[{"study_id": "S1"}]"#)
        .create_async()
        .await;

    // The per-subject export must carry the forms filter.
    let s1_mock = server
        .mock("POST", "/")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("records[0]".into(), "S1".into()),
            Matcher::UrlEncoded("forms[0]".into(), "demographics".into()),
        ]))
        .with_status(200)
        .with_body(r#"[{"study_id": "S1", "age": "34"}]"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let store = Arc::new(MemoryStore::new());
    let coordinator = LoadCoordinator::new(
        flat_project(),
        vec!["demographics".to_string()],
        client,
        store.clone(),
    );

    let summary = coordinator.execute_load().await.expect("load failed");
    s1_mock.assert_async().await;

    // Schema still materializes every table; only the fetch is narrowed.
    assert_eq!(summary.rows_written, 2);
    assert!(store.tables("demo").await.contains(&"visit_log".to_string()));
    assert!(store.table_rows("demo", "visit_log").await.is_empty());

    let runs = store.runs().await;
    assert_eq!(runs[0].instruments_loaded.as_deref(), Some("demographics"));
    assert_eq!(runs[0].loaded_summary(), "1");
}

#[tokio::test]
async fn test_recovered_field_warnings_reach_the_run_record() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/")
        .match_body(subject_list_matcher("study_id"))
        .with_status(200)
        .with_body(r#"[{"study_id": "S1"}]"#)
        .create_async()
        .await;

    server
        .mock("POST", "/")
        .match_body(subject_records_matcher("S1"))
        .with_status(200)
        .with_body(r#"[{"study_id": "S1", "age": "thirty-four", "sex": "2"}]"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let store = Arc::new(MemoryStore::new());
    let coordinator = LoadCoordinator::new(flat_project(), Vec::new(), client, store.clone());

    let summary = coordinator.execute_load().await.expect("load failed");

    // The bad value is skipped, the rest of the record survives.
    assert!(!summary.is_clean());
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("'age'"));

    let demographics = store.table_rows("demo", "demographics").await;
    let row = instrument_row(&demographics[0]);
    assert!(!row.values.contains_key("age"));
    assert_eq!(row.values.get("sex"), Some(&CellValue::Text("2".to_string())));

    // The run still completes; the warning lands in the comment.
    let runs = store.runs().await;
    assert_eq!(runs[0].status, RunStatus::EtlCompleted);
    assert!(runs[0].comment.as_deref().unwrap_or("").contains("'age'"));
}

#[tokio::test]
async fn test_api_failure_finalizes_the_run_as_failed() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/")
        .with_status(500)
        .with_body("Internal Server Error")
        .create_async()
        .await;

    let client = client_for(&server);
    let store = Arc::new(MemoryStore::new());
    let coordinator = LoadCoordinator::new(flat_project(), Vec::new(), client, store.clone());

    let err = coordinator.execute_load().await.unwrap_err();
    assert!(err.to_string().contains("500"), "unexpected error: {err}");

    // The namespace was reset and the schema applied before the fetch
    // failed, so the tables exist but are empty.
    assert!(!store.tables("demo").await.is_empty());
    assert_eq!(store.row_count("demo").await, 0);

    let runs = store.runs().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::EtlFailed);
    assert!(runs[0].comment.as_deref().unwrap_or("").contains("500"));
    assert!(runs[0].ended_at.is_some());
}
