/*!
 * Relational Journal Sink
 *
 * Append-only execution journal in a row-oriented store.
 *
 * - Connection opened lazily on first flush; DDL applied idempotently
 *   (table, missing columns, indexes, unique `(trace_id, event_seq)`).
 * - Accepted events are buffered and written in one batched insert once
 *   `batch_size` is reached, or on explicit flush / close.
 * - Inserts try "ignore conflicts" first. If the store rejects that syntax the
 *   sink switches to plain inserts for the rest of its life.
 * - Any connection or write failure drops the batch. Failed batches are never
 *   retried and never spilled to a local file.
 */

pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;

pub use schema::JournalSchema;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConnector;
pub use store::{JournalConnection, JournalConnector, JournalRow};

use super::{Sink, SinkFilter};
use crate::core::errors::{TelemetryError, TelemetryResult};
use crate::core::limits::RELATIONAL_DEFAULT_BATCH_SIZE;
use crate::telemetry::events::{Event, Level};
use parking_lot::Mutex;
use schema::EVOLVED_COLUMNS;
use std::sync::Arc;
use tracing::debug;

struct JournalState {
    conn: Option<Box<dyn JournalConnection>>,
    buffer: Vec<JournalRow>,
    supports_on_conflict: bool,
}

pub struct RelationalJournalSink {
    filter: SinkFilter,
    batch_size: usize,
    schema: JournalSchema,
    connector: Arc<dyn JournalConnector>,
    state: Mutex<JournalState>,
}

impl RelationalJournalSink {
    pub fn new(connector: Arc<dyn JournalConnector>, schema: JournalSchema, filter: SinkFilter) -> Self {
        Self {
            filter,
            batch_size: RELATIONAL_DEFAULT_BATCH_SIZE,
            schema,
            connector,
            state: Mutex::new(JournalState {
                conn: None,
                buffer: Vec::new(),
                supports_on_conflict: true,
            }),
        }
    }

    /// Flush threshold; values below 1 behave as 1
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn schema(&self) -> &JournalSchema {
        &self.schema
    }

    /// Rows waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Whether the "ignore conflicts" insert is still in use
    pub fn supports_on_conflict(&self) -> bool {
        self.state.lock().supports_on_conflict
    }

    fn open(&self) -> TelemetryResult<Box<dyn JournalConnection>> {
        let mut conn = self.connector.connect()?;
        if let Err(e) = self.apply_schema(conn.as_mut()) {
            let _ = conn.close();
            return Err(e);
        }
        Ok(conn)
    }

    fn apply_schema(&self, conn: &mut dyn JournalConnection) -> TelemetryResult<()> {
        conn.execute_batch(&self.schema.create_table())?;

        let existing = conn.table_columns(self.schema.table())?;
        for (column, ddl_type) in EVOLVED_COLUMNS {
            if !existing.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                conn.execute_batch(&self.schema.add_column(column, ddl_type))?;
            }
        }

        conn.execute_batch(&self.schema.indexes())
    }

    fn flush_locked(&self, state: &mut JournalState) -> TelemetryResult<()> {
        if state.buffer.is_empty() {
            return Ok(());
        }

        if state.conn.is_none() {
            match self.open() {
                Ok(conn) => state.conn = Some(conn),
                Err(e) => {
                    let dropped = state.buffer.len();
                    state.buffer.clear();
                    return Err(TelemetryError::dropped(dropped, &e));
                }
            }
        }

        let rows = std::mem::take(&mut state.buffer);
        let Some(conn) = state.conn.as_mut() else {
            return Ok(());
        };

        let first = if state.supports_on_conflict {
            self.schema.insert_ignore_conflicts()
        } else {
            self.schema.insert_plain()
        };

        let err = match conn.insert_rows(&first, &rows) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let _ = conn.rollback();

        if !state.supports_on_conflict {
            return Err(TelemetryError::dropped(rows.len(), &err));
        }

        state.supports_on_conflict = false;
        debug!(
            store = %self.connector.describe(),
            error = %err,
            "journal store rejected conflict-ignoring insert, using plain inserts"
        );

        match conn.insert_rows(&self.schema.insert_plain(), &rows) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = conn.rollback();
                Err(TelemetryError::dropped(rows.len(), &e))
            }
        }
    }
}

impl Sink for RelationalJournalSink {
    fn name(&self) -> &str {
        "relational_journal"
    }

    fn enabled(&self, channel: &str, level: Level, _name: Option<&str>) -> bool {
        self.filter.accepts(channel, level)
    }

    fn emit(&self, event: &Event) -> TelemetryResult<()> {
        if !self.filter.accepts(&event.channel, event.level) {
            return Ok(());
        }

        let row = JournalRow::from_event(event)?;
        let mut state = self.state.lock();
        state.buffer.push(row);
        if state.buffer.len() >= self.batch_size {
            self.flush_locked(&mut state)?;
        }
        Ok(())
    }

    fn flush(&self) -> TelemetryResult<()> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)
    }

    fn close(&self) -> TelemetryResult<()> {
        let mut state = self.state.lock();
        let flushed = self.flush_locked(&mut state);
        if let Some(mut conn) = state.conn.take() {
            let _ = conn.close();
        }
        flushed
    }
}

impl std::fmt::Debug for RelationalJournalSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalJournalSink")
            .field("store", &self.connector.describe())
            .field("table", &self.schema.table())
            .field("batch_size", &self.batch_size)
            .field("filter", &self.filter)
            .finish()
    }
}
