/*!
 * Document Journal Sink
 *
 * Append-only audit log in a document store (MongoDB, or the bundled
 * memory and JSON-lines stores). Events are buffered and written
 * with an unordered bulk insert so already-seen `(trace_id, event_seq)` pairs
 * are skipped without aborting the rest of the batch. Connection or write
 * failures drop the buffered batch, like the relational journal.
 */

pub mod jsonl;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod store;

pub use jsonl::JsonlDocumentConnector;
pub use memory::MemoryDocumentStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoDocumentConnector;
pub use store::{Document, DocumentCollection, DocumentConnector, IndexSpec, InsertManyOutcome};

use super::{Sink, SinkFilter};
use crate::core::clock::format_rfc3339;
use crate::core::errors::{TelemetryError, TelemetryResult};
use crate::core::limits::DOCUMENT_DEFAULT_BATCH_SIZE;
use crate::core::types::fields_to_json;
use crate::telemetry::events::{Event, Level};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

/// Indexes created on every journal collection
pub fn journal_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("uq_trace_eventseq", ["trace_id", "event_seq"]).unique(),
        IndexSpec::new("idx_ts", ["ts_utc"]),
        IndexSpec::new("idx_runner", ["runner_id"]),
        IndexSpec::new("idx_channel", ["channel"]),
        IndexSpec::new("idx_level", ["level"]),
    ]
}

/// Pick a store from a `mongodb://`, `mongodb+srv://`, `memory://`,
/// `file://<dir>` or `jsonl://<dir>` URI
pub fn connector_from_uri(uri: &str, database: &str, collection: &str) -> TelemetryResult<Arc<dyn DocumentConnector>> {
    let uri = uri.trim();
    if uri == "memory://" || uri == "memory:" {
        return Ok(Arc::new(MemoryDocumentStore::new()));
    }

    if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
        #[cfg(feature = "mongodb")]
        return Ok(Arc::new(MongoDocumentConnector::new(uri, database, collection)));
        #[cfg(not(feature = "mongodb"))]
        return Err(TelemetryError::UnsupportedStore(format!(
            "document journal URI {:?} (built without mongodb)",
            uri
        )));
    }

    let dir = uri
        .strip_prefix("jsonl://")
        .or_else(|| uri.strip_prefix("file://"))
        .filter(|d| !d.is_empty());

    match dir {
        Some(dir) => Ok(Arc::new(JsonlDocumentConnector::new(dir, database, collection))),
        None => Err(TelemetryError::UnsupportedStore(format!("document journal URI {:?}", uri))),
    }
}

/// Document form of an event; attributes and data stay nested
pub fn event_document(event: &Event) -> Document {
    let mut doc = Document::new();
    doc.insert("schema_version".into(), JsonValue::from(event.schema_version));
    doc.insert("runner_id".into(), JsonValue::from(event.runner_id.as_str()));
    doc.insert("trace_id".into(), JsonValue::from(event.trace_id.as_str()));
    doc.insert("event_seq".into(), JsonValue::from(event.event_seq));
    doc.insert("ts_utc".into(), JsonValue::from(format_rfc3339(event.ts_utc)));
    doc.insert("mono_ns".into(), event.mono_ns.map_or(JsonValue::Null, JsonValue::from));
    doc.insert("span_id".into(), event.span_id.as_deref().map_or(JsonValue::Null, JsonValue::from));
    doc.insert(
        "parent_span_id".into(),
        event.parent_span_id.as_deref().map_or(JsonValue::Null, JsonValue::from),
    );
    doc.insert("name".into(), JsonValue::from(event.name.as_str()));
    doc.insert("level".into(), JsonValue::from(event.level.as_str()));
    doc.insert("channel".into(), JsonValue::from(event.channel.as_str()));
    doc.insert(
        "attributes".into(),
        JsonValue::Object(event.attributes.as_ref().map(fields_to_json).unwrap_or_default()),
    );
    doc.insert("data".into(), JsonValue::Object(fields_to_json(&event.data)));
    doc
}

struct DocumentState {
    collection: Option<Box<dyn DocumentCollection>>,
    buffer: Vec<Document>,
}

pub struct DocumentJournalSink {
    filter: SinkFilter,
    batch_size: usize,
    connector: Arc<dyn DocumentConnector>,
    state: Mutex<DocumentState>,
}

impl DocumentJournalSink {
    pub fn new(connector: Arc<dyn DocumentConnector>, filter: SinkFilter) -> Self {
        Self {
            filter,
            batch_size: DOCUMENT_DEFAULT_BATCH_SIZE,
            connector,
            state: Mutex::new(DocumentState {
                collection: None,
                buffer: Vec::new(),
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

    pub fn buffered(&self) -> usize {
        self.state.lock().buffer.len()
    }

    fn open(&self) -> TelemetryResult<Box<dyn DocumentCollection>> {
        let mut collection = self.connector.connect()?;
        for index in journal_indexes() {
            if let Err(e) = collection.create_index(&index) {
                debug!(store = %self.connector.describe(), index = %index.name, error = %e, "journal index creation failed");
            }
        }
        Ok(collection)
    }

    fn flush_locked(&self, state: &mut DocumentState) -> TelemetryResult<()> {
        if state.buffer.is_empty() {
            return Ok(());
        }

        let documents = std::mem::take(&mut state.buffer);
        if state.collection.is_none() {
            match self.open() {
                Ok(collection) => state.collection = Some(collection),
                Err(e) => return Err(TelemetryError::dropped(documents.len(), &e)),
            }
        }

        let Some(collection) = state.collection.as_mut() else {
            return Ok(());
        };

        match collection.insert_many_unordered(&documents) {
            Ok(outcome) => {
                if outcome.duplicates > 0 {
                    debug!(
                        store = %self.connector.describe(),
                        inserted = outcome.inserted,
                        duplicates = outcome.duplicates,
                        "skipped already journaled events"
                    );
                }
                Ok(())
            }
            Err(e) => Err(TelemetryError::dropped(documents.len(), &e)),
        }
    }
}

impl Sink for DocumentJournalSink {
    fn name(&self) -> &str {
        "document_journal"
    }

    fn enabled(&self, channel: &str, level: Level, _name: Option<&str>) -> bool {
        self.filter.accepts(channel, level)
    }

    fn emit(&self, event: &Event) -> TelemetryResult<()> {
        if !self.filter.accepts(&event.channel, event.level) {
            return Ok(());
        }

        let mut state = self.state.lock();
        state.buffer.push(event_document(event));
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
        if let Some(mut collection) = state.collection.take() {
            let _ = collection.close();
        }
        flushed
    }
}

impl std::fmt::Debug for DocumentJournalSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentJournalSink")
            .field("store", &self.connector.describe())
            .field("batch_size", &self.batch_size)
            .field("filter", &self.filter)
            .finish()
    }
}
