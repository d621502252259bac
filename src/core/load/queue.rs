//! Bulk load queue
//!
//! Buffers transformed rows per target table and assigns surrogate ids.
//! One queue lives for one load run; ids come from a single monotonic
//! counter starting at 1, shared across every table, and are never reused,
//! not even after a flush drains the buffers. That keeps parent/child
//! references valid when a child row is queued before its parent flushes.

use crate::domain::errors::MirrorError;
use crate::domain::metadata::ProjectMetadata;
use crate::domain::rows::{
    EventBatch, EventRow, InstrumentRow, InstrumentTableBatch, LookupRow, LookupTableBatch,
    RootBatch, RootRow, RowBatch,
};
use crate::core::schema::{
    lookup_fk_column, lookup_table_name, EVENT_TABLE, ROOT_TABLE,
};
use crate::domain::ids::ProjectName;
use crate::domain::Result;
use std::collections::BTreeMap;

/// Buffered rows for one lookup table, with its column names
#[derive(Debug, Clone)]
struct LookupBuffer {
    fk_column: String,
    value_column: String,
    display_column: String,
    rows: Vec<LookupRow>,
}

/// Per-run row buffer with surrogate-id assignment
#[derive(Debug)]
pub struct BulkLoadQueue {
    namespace: ProjectName,
    next_id: i64,
    roots: Vec<RootRow>,
    root_key_column: String,
    events: Vec<EventRow>,
    instruments: BTreeMap<String, Vec<InstrumentRow>>,
    lookups: BTreeMap<String, LookupBuffer>,
}

impl BulkLoadQueue {
    /// Build an empty queue with one buffer per table the project defines
    pub fn new(project: &ProjectMetadata) -> Self {
        let mut instruments = BTreeMap::new();
        let mut lookups = BTreeMap::new();
        for instrument in &project.instruments {
            instruments.insert(instrument.table_name().to_string(), Vec::new());
            for field in instrument.multi_valued_fields() {
                let table = lookup_table_name(instrument.table_name(), field.column_name());
                lookups.insert(
                    table,
                    LookupBuffer {
                        fk_column: lookup_fk_column(instrument.table_name()),
                        value_column: field.column_name().to_string(),
                        display_column: field.display_column_name(),
                        rows: Vec::new(),
                    },
                );
            }
        }
        Self {
            namespace: project.name.clone(),
            next_id: 1,
            roots: Vec::new(),
            root_key_column: project.primary_key_field.clone(),
            events: Vec::new(),
            instruments,
            lookups,
        }
    }

    fn mint(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Mint a surrogate id without queuing anything
    ///
    /// Used when child rows must reference an instrument row before the
    /// instrument row itself is queued.
    pub fn reserve_instrument_id(&mut self) -> i64 {
        self.mint()
    }

    /// Queue one root row
    ///
    /// The caller is responsible for queuing each subject at most once per
    /// run; root rows carry their natural key and get no surrogate id.
    pub fn queue_root(&mut self, row: RootRow) {
        self.roots.push(row);
    }

    /// Queue one event row, assigning a surrogate id if it has none
    pub fn queue_event(&mut self, mut row: EventRow) -> i64 {
        let id = match row.id {
            Some(id) => id,
            None => self.mint(),
        };
        row.id = Some(id);
        self.events.push(row);
        id
    }

    /// Queue one instrument row, assigning a surrogate id if it has none
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Transform`] when `table` is not a table of
    /// the project this queue was built for.
    pub fn queue_instrument(&mut self, table: &str, mut row: InstrumentRow) -> Result<i64> {
        let id = match row.id {
            Some(id) => id,
            None => self.mint(),
        };
        row.id = Some(id);
        self.instruments
            .get_mut(table)
            .ok_or_else(|| {
                MirrorError::Transform(format!("no instrument table '{table}' in the load queue"))
            })?
            .push(row);
        Ok(id)
    }

    /// Queue one lookup row, always assigning a fresh surrogate id
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Transform`] when `table` is not a lookup
    /// table of the project this queue was built for.
    pub fn queue_lookup(&mut self, table: &str, mut row: LookupRow) -> Result<i64> {
        let id = self.mint();
        row.id = Some(id);
        self.lookups
            .get_mut(table)
            .ok_or_else(|| {
                MirrorError::Transform(format!("no lookup table '{table}' in the load queue"))
            })?
            .rows
            .push(row);
        Ok(id)
    }

    /// Number of rows currently buffered across all tables
    pub fn pending_rows(&self) -> usize {
        self.roots.len()
            + self.events.len()
            + self.instruments.values().map(Vec::len).sum::<usize>()
            + self.lookups.values().map(|b| b.rows.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_rows() == 0
    }

    /// Drain every buffer into one flushable batch
    ///
    /// Buffers stay registered and reusable afterwards; the id counter is
    /// not reset. Empty instrument and lookup buffers are omitted from the
    /// batch.
    pub fn take_batch(&mut self) -> RowBatch {
        let roots = RootBatch {
            table: ROOT_TABLE.to_string(),
            key_column: self.root_key_column.clone(),
            rows: std::mem::take(&mut self.roots),
        };
        let events = EventBatch {
            table: EVENT_TABLE.to_string(),
            rows: std::mem::take(&mut self.events),
        };
        let instruments = self
            .instruments
            .iter_mut()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(table, rows)| InstrumentTableBatch {
                table: table.clone(),
                rows: std::mem::take(rows),
            })
            .collect();
        let lookups = self
            .lookups
            .iter_mut()
            .filter(|(_, buffer)| !buffer.rows.is_empty())
            .map(|(table, buffer)| LookupTableBatch {
                table: table.clone(),
                fk_column: buffer.fk_column.clone(),
                value_column: buffer.value_column.clone(),
                display_column: buffer.display_column.clone(),
                rows: std::mem::take(&mut buffer.rows),
            })
            .collect();
        RowBatch {
            namespace: self.namespace.clone(),
            roots,
            events,
            instruments,
            lookups,
        }
    }
}
