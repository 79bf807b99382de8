/*!
 * SQLite Journal Store
 * `JournalConnector` backed by rusqlite
 */

use super::store::{JournalConnection, JournalConnector, JournalRow};
use crate::core::errors::{TelemetryError, TelemetryResult};
use rusqlite::{params, Connection};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Memory,
    File(PathBuf),
}

/// Opens SQLite journal databases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConnector {
    target: Target,
}

impl SqliteConnector {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
        }
    }

    /// Private in-memory database per connection
    pub fn in_memory() -> Self {
        Self {
            target: Target::Memory,
        }
    }

    /// Parse `sqlite::memory:` or `sqlite://<path>`
    pub fn from_dsn(dsn: &str) -> TelemetryResult<Self> {
        let dsn = dsn.trim();
        if dsn == "sqlite::memory:" || dsn == "sqlite://:memory:" {
            return Ok(Self::in_memory());
        }
        match dsn.strip_prefix("sqlite://") {
            Some(path) if !path.is_empty() => Ok(Self::file(path)),
            _ => Err(TelemetryError::UnsupportedStore(format!(
                "relational journal DSN {:?}",
                dsn
            ))),
        }
    }
}

impl JournalConnector for SqliteConnector {
    fn describe(&self) -> String {
        match &self.target {
            Target::Memory => "sqlite::memory:".to_string(),
            Target::File(path) => format!("sqlite://{}", path.display()),
        }
    }

    fn connect(&self) -> TelemetryResult<Box<dyn JournalConnection>> {
        let conn = match &self.target {
            Target::Memory => Connection::open_in_memory(),
            Target::File(path) => Connection::open(path),
        }
        .map_err(|e| TelemetryError::Connection(e.to_string()))?;

        Ok(Box::new(SqliteConnection { conn: Some(conn) }))
    }
}

struct SqliteConnection {
    conn: Option<Connection>,
}

impl SqliteConnection {
    fn conn(&mut self) -> TelemetryResult<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| TelemetryError::Connection("connection already closed".into()))
    }
}

impl JournalConnection for SqliteConnection {
    fn execute_batch(&mut self, sql: &str) -> TelemetryResult<()> {
        self.conn()?
            .execute_batch(sql)
            .map_err(|e| TelemetryError::Schema(e.to_string()))
    }

    fn table_columns(&mut self, table: &str) -> TelemetryResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .map_err(|e| TelemetryError::Schema(e.to_string()))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| TelemetryError::Schema(e.to_string()))?;
        Ok(columns)
    }

    fn insert_rows(&mut self, sql: &str, rows: &[JournalRow]) -> TelemetryResult<()> {
        let write_err = |e: rusqlite::Error| TelemetryError::Write(e.to_string());

        let tx = self.conn()?.transaction().map_err(write_err)?;
        {
            let mut stmt = tx.prepare(sql).map_err(write_err)?;
            for row in rows {
                stmt.execute(params![
                    row.runner_id,
                    row.trace_id,
                    row.event_seq,
                    row.ts_utc,
                    row.mono_ns,
                    row.span_id,
                    row.parent_span_id,
                    row.name,
                    row.level,
                    row.channel,
                    row.attributes_json,
                    row.data_json,
                    row.schema_version,
                ])
                .map_err(write_err)?;
            }
        }
        // Dropping an uncommitted transaction rolls it back
        tx.commit().map_err(write_err)
    }

    fn close(&mut self) -> TelemetryResult<()> {
        match self.conn.take() {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| TelemetryError::Connection(e.to_string())),
            None => Ok(()),
        }
    }
}
