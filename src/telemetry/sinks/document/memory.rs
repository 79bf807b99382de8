/*!
 * In-Memory Document Store
 * Process-local collection for `memory://` journals and tests
 */

use super::store::{Document, DocumentCollection, DocumentConnector, IndexSpec, InsertManyOutcome, UniqueIndexes};
use crate::core::errors::TelemetryResult;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<Document>,
    indexes: UniqueIndexes,
}

/// Shared in-memory collection; clones see the same documents
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Collection>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.inner.lock().documents.clone()
    }

    /// Names of the indexes created so far
    pub fn indexes(&self) -> Vec<String> {
        self.inner.lock().indexes.names()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().documents.is_empty()
    }
}

impl DocumentConnector for MemoryDocumentStore {
    fn describe(&self) -> String {
        "memory://".to_string()
    }

    fn connect(&self) -> TelemetryResult<Box<dyn DocumentCollection>> {
        Ok(Box::new(self.clone()))
    }
}

impl DocumentCollection for MemoryDocumentStore {
    fn create_index(&mut self, index: &IndexSpec) -> TelemetryResult<()> {
        let mut guard = self.inner.lock();
        let Collection { documents, indexes } = &mut *guard;
        indexes.create(index, documents.iter())
    }

    fn insert_many_unordered(&mut self, documents: &[Document]) -> TelemetryResult<InsertManyOutcome> {
        let mut collection = self.inner.lock();
        let mut outcome = InsertManyOutcome::default();

        for document in documents {
            if collection.indexes.admit(document) {
                collection.documents.push(document.clone());
                outcome.inserted += 1;
            } else {
                outcome.duplicates += 1;
            }
        }
        Ok(outcome)
    }
}
