//! Record transformer
//!
//! The core of the load pipeline: turns one raw export record into typed
//! rows and hands them to the bulk load queue. One transformer lives for
//! one load run and memoizes the root and event rows it has already
//! queued, so a subject appearing in many records yields exactly one root
//! row and one event row per (event, instance).
//!
//! Per-field coercion failures are recovered: the offending column stays
//! unset, the failure is logged and accumulated for the run record. A
//! marker naming an instrument or event the project does not define is
//! fatal, since continuing would silently drop data the schema has no
//! table for.

use crate::core::load::BulkLoadQueue;
use crate::core::schema::lookup_table_name;
use crate::core::transform::coerce::{coerce_value, resolve_display};
use crate::core::transform::record::{RawRecord, EVENT_NAME_MARKER};
use crate::domain::errors::{FieldCoercionError, MirrorError};
use crate::domain::ids::SubjectId;
use crate::domain::metadata::{EventMetadata, FieldType, InstrumentMetadata, ProjectMetadata};
use crate::domain::rows::{CellValue, EventRow, InstrumentRow, LookupRow, RootRow, RowOwner};
use crate::domain::Result;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Memoization key for event rows: subject, event name, event instance
type EventKey = (SubjectId, String, Option<i32>);

/// Stateful per-run record transformer
pub struct RecordTransformer<'a> {
    project: &'a ProjectMetadata,
    /// Instrument allow-list; `None` loads every instrument
    include: Option<HashSet<String>>,
    seen_subjects: HashSet<SubjectId>,
    event_ids: HashMap<EventKey, i64>,
    warnings: Vec<String>,
}

impl<'a> RecordTransformer<'a> {
    /// Create a transformer for one load run
    ///
    /// An empty allow-list means no filtering, same as `None`.
    pub fn new(project: &'a ProjectMetadata, include_instruments: Option<&[String]>) -> Self {
        let include = include_instruments
            .filter(|names| !names.is_empty())
            .map(|names| names.iter().cloned().collect());
        Self {
            project,
            include,
            seen_subjects: HashSet::new(),
            event_ids: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Transform one raw record into queued rows
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Transform`] when the record lacks its
    /// primary-key value or a parseable repeat instance, and
    /// [`MirrorError::MetadataNotFound`] when a marker names an event or
    /// instrument the project does not define.
    pub fn transform(&mut self, record: &RawRecord, queue: &mut BulkLoadQueue) -> Result<()> {
        let subject = record.primary_key_value(&self.project.primary_key_field)?;
        self.ensure_root(&subject, queue);
        if self.project.longitudinal {
            self.transform_longitudinal(subject, record, queue)
        } else {
            self.transform_flat(subject, record, queue)
        }
    }

    /// Drain the warnings accumulated so far
    ///
    /// Each entry is one recovered per-field failure, destined for the run
    /// record's comments.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn included(&self, instrument: &str) -> bool {
        self.include
            .as_ref()
            .map_or(true, |set| set.contains(instrument))
    }

    fn ensure_root(&mut self, subject: &SubjectId, queue: &mut BulkLoadQueue) {
        if self.seen_subjects.insert(subject.clone()) {
            queue.queue_root(RootRow {
                subject: subject.clone(),
            });
        }
    }

    fn ensure_event(
        &mut self,
        subject: &SubjectId,
        event: &EventMetadata,
        instance: Option<i32>,
        queue: &mut BulkLoadQueue,
    ) -> i64 {
        let key = (subject.clone(), event.unique_name.clone(), instance);
        if let Some(&id) = self.event_ids.get(&key) {
            return id;
        }
        let id = queue.queue_event(EventRow {
            id: None,
            subject: subject.clone(),
            event_unique_name: event.unique_name.clone(),
            event_label: event.label.clone(),
            arm_number: event.arm_number,
            repeat_instance: instance,
        });
        self.event_ids.insert(key, id);
        id
    }

    fn transform_flat(
        &mut self,
        subject: SubjectId,
        record: &RawRecord,
        queue: &mut BulkLoadQueue,
    ) -> Result<()> {
        let project = self.project;
        if let Some(name) = record.repeat_instrument() {
            if !self.included(name) {
                debug!(instrument = name, "Skipping excluded repeat instrument");
                return Ok(());
            }
            let instrument = project.instrument(name)?;
            self.build_instrument_row(instrument, record, RowOwner::Root(subject), queue)?;
        } else {
            for instrument in project.non_repeating_instruments() {
                if !self.included(&instrument.unique_name) {
                    continue;
                }
                self.build_instrument_row(
                    instrument,
                    record,
                    RowOwner::Root(subject.clone()),
                    queue,
                )?;
            }
        }
        Ok(())
    }

    fn transform_longitudinal(
        &mut self,
        subject: SubjectId,
        record: &RawRecord,
        queue: &mut BulkLoadQueue,
    ) -> Result<()> {
        let project = self.project;
        let event_name = record.event_name().ok_or_else(|| {
            MirrorError::Transform(format!(
                "longitudinal record for subject '{subject}' is missing {EVENT_NAME_MARKER}"
            ))
        })?;
        let event = project.event(event_name)?;
        let repeat_instrument = record.repeat_instrument();

        // An instance without a repeat-instrument marker keys the event
        // itself; with a marker it keys the instrument row instead.
        let event_instance = if event.repeatable && repeat_instrument.is_none() {
            record.repeat_instance()?
        } else {
            None
        };
        let event_id = self.ensure_event(&subject, event, event_instance, queue);

        if let Some(name) = repeat_instrument {
            if !self.included(name) {
                debug!(instrument = name, "Skipping excluded repeat instrument");
                return Ok(());
            }
            let instrument = project.instrument(name)?;
            self.build_instrument_row(instrument, record, RowOwner::Event(event_id), queue)?;
        } else {
            for instrument in project.event_instruments(event)? {
                if !self.included(&instrument.unique_name) {
                    continue;
                }
                self.build_instrument_row(instrument, record, RowOwner::Event(event_id), queue)?;
            }
        }
        Ok(())
    }

    fn build_instrument_row(
        &mut self,
        instrument: &InstrumentMetadata,
        record: &RawRecord,
        owner: RowOwner,
        queue: &mut BulkLoadQueue,
    ) -> Result<()> {
        if !instrument_has_data(instrument, record) {
            return Ok(());
        }

        // Reserved up front so lookup rows can reference the instrument row
        // before it is queued.
        let instrument_id = queue.reserve_instrument_id();
        let mut row = InstrumentRow::new(owner);
        row.id = Some(instrument_id);
        row.repeat_instance = record.repeat_instance()?;

        for field in instrument.scalar_fields() {
            let Some(raw) = record.value(&field.unique_name) else {
                continue;
            };
            match coerce_value(field, raw) {
                Ok(Some(value)) => {
                    row.set(field.column_name(), value);
                    if field.field_type == FieldType::Text && field.has_display_lookup() {
                        match resolve_display(field, raw) {
                            Ok(label) => {
                                row.set(field.display_column_name(), CellValue::Text(label));
                            }
                            Err(err) => self.record_warning(err),
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => self.record_warning(err),
            }
        }

        for field in instrument.multi_valued_fields() {
            for (option_key, display_value) in &field.display_lookup {
                let sub_field = field.sub_field_name(option_key);
                if record.get(&sub_field) == Some("1") {
                    let table = lookup_table_name(instrument.table_name(), field.column_name());
                    queue.queue_lookup(
                        &table,
                        LookupRow {
                            id: None,
                            instrument_id,
                            option_key: option_key.clone(),
                            display_value: display_value.clone(),
                        },
                    )?;
                }
            }
        }

        queue.queue_instrument(instrument.table_name(), row)?;
        Ok(())
    }

    fn record_warning(&mut self, err: FieldCoercionError) {
        warn!(field = %err.field, value = %err.value, "Recovered field failure");
        self.warnings.push(err.to_string());
    }
}

/// Whether any of the instrument's fields carry a non-empty value
///
/// Multi-valued fields count as present when any per-option sub-field is
/// non-empty. Computed before any row is created, so an instrument with no
/// data produces zero rows.
fn instrument_has_data(instrument: &InstrumentMetadata, record: &RawRecord) -> bool {
    instrument.fields.iter().any(|field| {
        if field.multi_valued {
            field
                .display_lookup
                .keys()
                .any(|key| record.value(&field.sub_field_name(key)).is_some())
        } else {
            record.value(&field.unique_name).is_some()
        }
    })
}
