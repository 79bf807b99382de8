/*!
 * Journal Schema
 * DDL and insert statements for the append-only execution journal table
 */

use crate::core::errors::{TelemetryError, TelemetryResult};

/// Column list shared by both insert statements, in bind order
pub const INSERT_COLUMNS: &str = "runner_id, trace_id, event_seq, ts_utc, mono_ns, span_id, \
     parent_span_id, name, level, channel, attributes_json, data_json, schema_version";

/// Columns added after the first schema version; applied when missing
pub const EVOLVED_COLUMNS: &[(&str, &str)] = &[
    ("runner_id", "TEXT NULL"),
    ("event_seq", "BIGINT NULL"),
    ("mono_ns", "BIGINT NULL"),
];

/// Plain SQL identifier check (table names are interpolated into DDL)
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Statement factory for one journal table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalSchema {
    table: String,
}

impl JournalSchema {
    pub fn new(table: impl Into<String>) -> TelemetryResult<Self> {
        let table = table.into();
        if !is_identifier(&table) {
            return Err(TelemetryError::Config(format!(
                "journal table name {:?} is not a plain identifier",
                table
            )));
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn create_table(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {t} (\n\
             \x20 id INTEGER PRIMARY KEY,\n\
             \x20 runner_id TEXT NULL,\n\
             \x20 trace_id TEXT NOT NULL,\n\
             \x20 event_seq BIGINT NULL,\n\
             \x20 ts_utc TEXT NOT NULL,\n\
             \x20 mono_ns BIGINT NULL,\n\
             \x20 span_id TEXT NULL,\n\
             \x20 parent_span_id TEXT NULL,\n\
             \x20 name TEXT NOT NULL,\n\
             \x20 level TEXT NOT NULL,\n\
             \x20 channel TEXT NOT NULL,\n\
             \x20 attributes_json TEXT NOT NULL,\n\
             \x20 data_json TEXT NOT NULL,\n\
             \x20 schema_version INTEGER NOT NULL\n\
             );",
            t = self.table
        )
    }

    pub fn add_column(&self, column: &str, ddl_type: &str) -> String {
        format!("ALTER TABLE {} ADD COLUMN {} {};", self.table, column, ddl_type)
    }

    /// Secondary indexes plus the `(trace_id, event_seq)` dedupe index
    pub fn indexes(&self) -> String {
        let t = &self.table;
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{t}_trace_ts ON {t}(trace_id, ts_utc);\n\
             CREATE INDEX IF NOT EXISTS idx_{t}_span ON {t}(span_id);\n\
             CREATE INDEX IF NOT EXISTS idx_{t}_name ON {t}(name);\n\
             CREATE INDEX IF NOT EXISTS idx_{t}_channel ON {t}(channel);\n\
             CREATE INDEX IF NOT EXISTS idx_{t}_runner ON {t}(runner_id);\n\
             CREATE UNIQUE INDEX IF NOT EXISTS uq_{t}_trace_eventseq ON {t}(trace_id, event_seq);",
            t = t
        )
    }

    pub fn insert_ignore_conflicts(&self) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (trace_id, event_seq) DO NOTHING",
            self.table, INSERT_COLUMNS
        )
    }

    pub fn insert_plain(&self) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.table, INSERT_COLUMNS
        )
    }
}
