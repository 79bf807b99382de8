/*!
 * Relational Store Interface
 *
 * The journal sink talks to its database only through these traits. A
 * concrete driver is chosen at bootstrap from the configured DSN; without
 * one the sink is simply not installed.
 */

use crate::core::clock::format_rfc3339;
use crate::core::errors::TelemetryResult;
use crate::telemetry::events::Event;

/// One journal row, already flattened to column values in bind order
#[derive(Debug, Clone, PartialEq)]
pub struct JournalRow {
    pub runner_id: Option<String>,
    pub trace_id: String,
    pub event_seq: Option<i64>,
    pub ts_utc: String,
    pub mono_ns: Option<i64>,
    pub span_id: Option<String>,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub level: String,
    pub channel: String,
    pub attributes_json: String,
    pub data_json: String,
    pub schema_version: i64,
}

impl JournalRow {
    pub fn from_event(event: &Event) -> TelemetryResult<Self> {
        let attributes_json = match &event.attributes {
            Some(attributes) => serde_json::to_string(attributes)?,
            None => "{}".to_string(),
        };
        let data_json = serde_json::to_string(&event.data)?;

        Ok(Self {
            runner_id: Some(event.runner_id.clone()).filter(|r| !r.is_empty()),
            trace_id: event.trace_id.clone(),
            event_seq: i64::try_from(event.event_seq).ok(),
            ts_utc: format_rfc3339(event.ts_utc),
            mono_ns: event.mono_ns.and_then(|ns| i64::try_from(ns).ok()),
            span_id: event.span_id.clone(),
            parent_span_id: event.parent_span_id.clone(),
            name: event.name.clone(),
            level: event.level.as_str().to_string(),
            channel: event.channel.clone(),
            attributes_json,
            data_json,
            schema_version: i64::from(event.schema_version),
        })
    }
}

/// Opens connections to a journal database
pub trait JournalConnector: Send + Sync {
    /// Human-readable target for diagnostics (never includes credentials)
    fn describe(&self) -> String;

    fn connect(&self) -> TelemetryResult<Box<dyn JournalConnection>>;
}

/// A live journal connection
///
/// Statements use `?` positional placeholders in [`JournalRow`] field order.
pub trait JournalConnection: Send {
    /// Run one or more `;`-separated DDL statements
    fn execute_batch(&mut self, sql: &str) -> TelemetryResult<()>;

    /// Column names currently present on `table`
    fn table_columns(&mut self, table: &str) -> TelemetryResult<Vec<String>>;

    /// Execute `sql` once per row inside a single transaction, then commit
    fn insert_rows(&mut self, sql: &str, rows: &[JournalRow]) -> TelemetryResult<()>;

    /// Abandon a failed transaction
    fn rollback(&mut self) -> TelemetryResult<()> {
        Ok(())
    }

    fn close(&mut self) -> TelemetryResult<()>;
}
