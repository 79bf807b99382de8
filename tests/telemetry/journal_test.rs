/*!
 * Journal Sink Tests
 */

use super::common::event;
use mockall::mock;
use parking_lot::Mutex;
use runner_telemetry::telemetry::sinks::document::{
    Document, DocumentCollection, DocumentConnector, IndexSpec, InsertManyOutcome, JsonlDocumentConnector,
    MemoryDocumentStore,
};
use runner_telemetry::telemetry::sinks::relational::{JournalConnection, JournalConnector, JournalRow, JournalSchema};
use runner_telemetry::{DocumentJournalSink, RelationalJournalSink, Sink, SinkFilter, TelemetryError, TelemetryResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mock! {
    pub Journal {}

    impl JournalConnection for Journal {
        fn execute_batch(&mut self, sql: &str) -> TelemetryResult<()>;
        fn table_columns(&mut self, table: &str) -> TelemetryResult<Vec<String>>;
        fn insert_rows(&mut self, sql: &str, rows: &[JournalRow]) -> TelemetryResult<()>;
        fn rollback(&mut self) -> TelemetryResult<()>;
        fn close(&mut self) -> TelemetryResult<()>;
    }
}

mock! {
    pub Collection {}

    impl DocumentCollection for Collection {
        fn create_index(&mut self, index: &IndexSpec) -> TelemetryResult<()>;
        fn insert_many_unordered(&mut self, documents: &[Document]) -> TelemetryResult<InsertManyOutcome>;
        fn close(&mut self) -> TelemetryResult<()>;
    }
}

/// Hands out pre-scripted connections, then refuses
#[derive(Default)]
struct ScriptedJournal {
    pending: Mutex<Vec<MockJournal>>,
    connects: AtomicUsize,
}

impl ScriptedJournal {
    fn with(conn: MockJournal) -> Self {
        Self {
            pending: Mutex::new(vec![conn]),
            connects: AtomicUsize::new(0),
        }
    }
}

impl JournalConnector for ScriptedJournal {
    fn describe(&self) -> String {
        "scripted".into()
    }

    fn connect(&self) -> TelemetryResult<Box<dyn JournalConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.pending.lock().pop() {
            Some(conn) => Ok(Box::new(conn)),
            None => Err(TelemetryError::Connection("connection refused".into())),
        }
    }
}

struct ScriptedCollection(Mutex<Option<MockCollection>>);

impl DocumentConnector for ScriptedCollection {
    fn describe(&self) -> String {
        "scripted".into()
    }

    fn connect(&self) -> TelemetryResult<Box<dyn DocumentCollection>> {
        match self.0.lock().take() {
            Some(collection) => Ok(Box::new(collection)),
            None => Err(TelemetryError::Connection("connection refused".into())),
        }
    }
}

fn current_columns() -> Vec<String> {
    ["id", "runner_id", "trace_id", "event_seq", "mono_ns"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn schema() -> JournalSchema {
    JournalSchema::new("journal").unwrap()
}

#[test]
fn test_conflict_clause_fallback_is_permanent() {
    let mut conn = MockJournal::new();
    conn.expect_execute_batch().returning(|_| Ok(()));
    conn.expect_table_columns().returning(|_| Ok(current_columns()));
    conn.expect_insert_rows()
        .withf(|sql, _| sql.contains("ON CONFLICT"))
        .times(1)
        .returning(|_, _| Err(TelemetryError::Write("syntax error near ON".into())));
    conn.expect_insert_rows()
        .withf(|sql, _| !sql.contains("ON CONFLICT"))
        .times(2)
        .returning(|_, _| Ok(()));
    conn.expect_rollback().times(1).returning(|| Ok(()));
    conn.expect_close().times(1).returning(|| Ok(()));

    let sink = RelationalJournalSink::new(Arc::new(ScriptedJournal::with(conn)), schema(), SinkFilter::default())
        .with_batch_size(1);

    sink.emit(&event("t", 1, "ops")).unwrap();
    assert!(!sink.supports_on_conflict());
    sink.emit(&event("t", 2, "ops")).unwrap();
    sink.close().unwrap();
}

#[test]
fn test_missing_columns_are_added() {
    let mut conn = MockJournal::new();
    conn.expect_table_columns()
        .returning(|_| Ok(vec!["id".to_string(), "trace_id".to_string()]));
    conn.expect_execute_batch()
        .withf(|sql| sql.starts_with("ALTER TABLE journal ADD COLUMN"))
        .times(3)
        .returning(|_| Ok(()));
    conn.expect_execute_batch()
        .withf(|sql| !sql.starts_with("ALTER TABLE"))
        .times(2)
        .returning(|_| Ok(()));
    conn.expect_insert_rows().returning(|_, _| Ok(()));
    conn.expect_close().returning(|| Ok(()));

    let sink = RelationalJournalSink::new(Arc::new(ScriptedJournal::with(conn)), schema(), SinkFilter::default());
    sink.emit(&event("t", 1, "ops")).unwrap();
    sink.close().unwrap();
}

#[test]
fn test_write_failure_drops_batch() {
    let mut conn = MockJournal::new();
    conn.expect_execute_batch().returning(|_| Ok(()));
    conn.expect_table_columns().returning(|_| Ok(current_columns()));
    conn.expect_insert_rows()
        .returning(|_, _| Err(TelemetryError::Write("disk full".into())));
    conn.expect_rollback().returning(|| Ok(()));
    conn.expect_close().returning(|| Ok(()));

    let sink = RelationalJournalSink::new(Arc::new(ScriptedJournal::with(conn)), schema(), SinkFilter::default())
        .with_batch_size(10);

    for seq in 1..=3 {
        sink.emit(&event("t", seq, "ops")).unwrap();
    }
    assert_eq!(sink.buffered(), 3);

    let err = sink.flush().unwrap_err();
    assert!(matches!(err, TelemetryError::Dropped { dropped: 3, .. }));
    assert_eq!(sink.buffered(), 0);

    // Nothing left to retry
    assert!(sink.flush().is_ok());
}

#[test]
fn test_write_failure_keeps_connection_open() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let mut conn = MockJournal::new();
    conn.expect_execute_batch().returning(|_| Ok(()));
    conn.expect_table_columns().returning(|_| Ok(current_columns()));
    conn.expect_insert_rows().returning(move |_, _| {
        if seen.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(TelemetryError::Write("database is locked".into()))
        } else {
            Ok(())
        }
    });
    conn.expect_rollback().times(2).returning(|| Ok(()));
    conn.expect_close().times(1).returning(|| Ok(()));

    let connector = Arc::new(ScriptedJournal::with(conn));
    let sink = RelationalJournalSink::new(connector.clone(), schema(), SinkFilter::default()).with_batch_size(1);

    assert!(matches!(
        sink.emit(&event("t", 1, "ops")),
        Err(TelemetryError::Dropped { dropped: 1, .. })
    ));
    sink.emit(&event("t", 2, "ops")).unwrap();

    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    sink.close().unwrap();
}

#[test]
fn test_connection_failure_drops_batch_and_reconnects_later() {
    let connector = Arc::new(ScriptedJournal::default());
    let sink = RelationalJournalSink::new(connector.clone(), schema(), SinkFilter::default());

    sink.emit(&event("t", 1, "ops")).unwrap();
    sink.emit(&event("t", 2, "ops")).unwrap();
    match sink.flush() {
        Err(TelemetryError::Dropped { dropped, reason }) => {
            assert_eq!(dropped, 2);
            assert!(reason.contains("connection refused"));
        }
        other => panic!("expected dropped batch, got {:?}", other),
    }

    sink.emit(&event("t", 3, "ops")).unwrap();
    assert!(sink.flush().is_err());
    assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
}

#[test]
fn test_filtered_events_never_reach_store() {
    let connector = Arc::new(ScriptedJournal::default());
    let sink = RelationalJournalSink::new(connector.clone(), schema(), SinkFilter::default());

    sink.emit(&event("t", 1, "debug")).unwrap();
    assert_eq!(sink.buffered(), 0);
    sink.flush().unwrap();
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use runner_telemetry::telemetry::sinks::relational::SqliteConnector;
    use std::path::Path;

    fn count_rows(path: &Path) -> i64 {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.query_row("SELECT COUNT(*) FROM journal", [], |r| r.get(0)).unwrap()
    }

    fn sink(path: &Path, batch_size: usize) -> RelationalJournalSink {
        RelationalJournalSink::new(Arc::new(SqliteConnector::file(path)), schema(), SinkFilter::default())
            .with_batch_size(batch_size)
    }

    #[test]
    fn test_duplicate_events_stored_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");

        let first = sink(&path, 100);
        first.emit(&event("t", 1, "ops")).unwrap();
        first.emit(&event("t", 2, "audit")).unwrap();
        first.flush().unwrap();
        first.emit(&event("t", 1, "ops")).unwrap();
        first.flush().unwrap();
        assert!(first.supports_on_conflict());
        first.close().unwrap();
        assert_eq!(count_rows(&path), 2);

        let restarted = sink(&path, 100);
        restarted.emit(&event("t", 2, "ops")).unwrap();
        restarted.emit(&event("t", 3, "ops")).unwrap();
        restarted.emit(&event("other", 1, "ops")).unwrap();
        restarted.close().unwrap();
        assert_eq!(count_rows(&path), 4);
    }

    #[test]
    fn test_flushes_at_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let sink = sink(&path, 2);

        sink.emit(&event("t", 1, "ops")).unwrap();
        assert_eq!(sink.buffered(), 1);
        sink.emit(&event("t", 2, "ops")).unwrap();
        assert_eq!(sink.buffered(), 0);
        assert_eq!(count_rows(&path), 2);
    }

    #[test]
    fn test_legacy_table_is_evolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE journal (
                   id INTEGER PRIMARY KEY,
                   trace_id TEXT NOT NULL,
                   ts_utc TEXT NOT NULL,
                   span_id TEXT NULL,
                   parent_span_id TEXT NULL,
                   name TEXT NOT NULL,
                   level TEXT NOT NULL,
                   channel TEXT NOT NULL,
                   attributes_json TEXT NOT NULL,
                   data_json TEXT NOT NULL,
                   schema_version INTEGER NOT NULL
                 );",
            )
            .unwrap();
        }

        let sink = sink(&path, 1);
        sink.emit(&event("t", 7, "ops")).unwrap();
        sink.close().unwrap();

        let conn = rusqlite::Connection::open(&path).unwrap();
        let (runner, seq, attributes): (String, i64, String) = conn
            .query_row("SELECT runner_id, event_seq, attributes_json FROM journal", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!(runner, "runner-test");
        assert_eq!(seq, 7);
        assert_eq!(attributes, r#"{"stage":"model"}"#);

        let unique: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'uq_journal_trace_eventseq'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(unique, 1);
    }

    #[test]
    fn test_emit_after_close_reconnects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let sink = sink(&path, 1);

        sink.emit(&event("t", 1, "ops")).unwrap();
        sink.close().unwrap();
        sink.emit(&event("t", 2, "ops")).unwrap();
        sink.close().unwrap();
        assert_eq!(count_rows(&path), 2);
    }
}

#[test]
fn test_document_dedupe_across_restarts() {
    let store = MemoryDocumentStore::new();

    let first = DocumentJournalSink::new(Arc::new(store.clone()), SinkFilter::default());
    first.emit(&event("t", 1, "ops")).unwrap();
    first.emit(&event("t", 2, "ops")).unwrap();
    first.emit(&event("t", 1, "ops")).unwrap();
    first.close().unwrap();
    assert_eq!(store.len(), 2);

    let second = DocumentJournalSink::new(Arc::new(store.clone()), SinkFilter::default());
    second.emit(&event("t", 2, "ops")).unwrap();
    second.emit(&event("t", 3, "ops")).unwrap();
    second.close().unwrap();
    assert_eq!(store.len(), 3);

    let mut indexes = store.indexes();
    indexes.sort();
    assert_eq!(indexes, vec!["idx_channel", "idx_level", "idx_runner", "idx_ts", "uq_trace_eventseq"]);
}

#[test]
fn test_jsonl_journal_keeps_nested_documents() {
    let dir = tempfile::tempdir().unwrap();
    let connector = JsonlDocumentConnector::new(dir.path(), "runner", "execution_journal_events");

    let sink = DocumentJournalSink::new(Arc::new(connector.clone()), SinkFilter::default()).with_batch_size(2);
    sink.emit(&event("t", 1, "ops")).unwrap();
    sink.emit(&event("t", 2, "audit")).unwrap();
    sink.emit(&event("t", 2, "audit")).unwrap();
    sink.close().unwrap();

    let restarted = DocumentJournalSink::new(Arc::new(connector.clone()), SinkFilter::default());
    restarted.emit(&event("t", 1, "ops")).unwrap();
    restarted.close().unwrap();

    let raw = std::fs::read_to_string(connector.path()).unwrap();
    let docs: Vec<serde_json::Value> = raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["attributes"]["stage"], "model");
    assert_eq!(docs[1]["data"]["status"], "ok");
    assert!(docs[0]["ts_utc"].is_string());
}

#[test]
fn test_document_index_failures_are_ignored() {
    let mut collection = MockCollection::new();
    collection
        .expect_create_index()
        .times(5)
        .returning(|_| Err(TelemetryError::Schema("not supported".into())));
    collection
        .expect_insert_many_unordered()
        .times(1)
        .returning(|docs| Ok(InsertManyOutcome { inserted: docs.len(), duplicates: 0 }));
    collection.expect_close().returning(|| Ok(()));

    let sink = DocumentJournalSink::new(
        Arc::new(ScriptedCollection(Mutex::new(Some(collection)))),
        SinkFilter::default(),
    );
    sink.emit(&event("t", 1, "ops")).unwrap();
    assert!(sink.close().is_ok());
}

#[test]
fn test_document_write_failure_drops_batch() {
    let mut collection = MockCollection::new();
    collection.expect_create_index().returning(|_| Ok(()));
    collection
        .expect_insert_many_unordered()
        .returning(|_| Err(TelemetryError::Write("network timeout".into())));
    collection.expect_close().returning(|| Ok(()));

    let sink = DocumentJournalSink::new(
        Arc::new(ScriptedCollection(Mutex::new(Some(collection)))),
        SinkFilter::default(),
    )
    .with_batch_size(5);

    sink.emit(&event("t", 1, "ops")).unwrap();
    sink.emit(&event("t", 2, "ops")).unwrap();
    assert!(matches!(sink.flush(), Err(TelemetryError::Dropped { dropped: 2, .. })));
    assert_eq!(sink.buffered(), 0);
}
