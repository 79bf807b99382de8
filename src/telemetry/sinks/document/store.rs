/*!
 * Document Store Interface
 *
 * The document journal writes through these traits only. Stores enforce
 * their unique indexes themselves and report duplicates instead of failing
 * the whole batch.
 */

use crate::core::errors::{TelemetryError, TelemetryResult};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// One stored document
pub type Document = serde_json::Map<String, JsonValue>;

/// Index definition over one or more top-level fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            keys: keys.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Result of an unordered bulk insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertManyOutcome {
    pub inserted: usize,
    /// Documents skipped because a unique index already held their key
    pub duplicates: usize,
}

/// Opens handles to one journal collection
pub trait DocumentConnector: Send + Sync {
    fn describe(&self) -> String;

    fn connect(&self) -> TelemetryResult<Box<dyn DocumentCollection>>;
}

/// A live collection handle
pub trait DocumentCollection: Send {
    /// Create an index if it does not exist yet
    fn create_index(&mut self, index: &IndexSpec) -> TelemetryResult<()>;

    /// Insert every document that does not violate a unique index.
    /// Duplicates are counted and skipped; they never abort the rest.
    fn insert_many_unordered(&mut self, documents: &[Document]) -> TelemetryResult<InsertManyOutcome>;

    fn close(&mut self) -> TelemetryResult<()> {
        Ok(())
    }
}

/// Compound key of `document` under `keys`; missing fields count as null
pub(crate) fn index_key(document: &Document, keys: &[String]) -> String {
    let values: Vec<&JsonValue> = keys
        .iter()
        .map(|k| document.get(k).unwrap_or(&JsonValue::Null))
        .collect();
    serde_json::to_string(&values).unwrap_or_default()
}

/// Unique-index bookkeeping shared by the bundled stores
#[derive(Debug, Default)]
pub(crate) struct UniqueIndexes {
    specs: Vec<IndexSpec>,
    seen: HashMap<String, HashSet<String>>,
}

impl UniqueIndexes {
    pub(crate) fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    /// Register `index`, seeding unique keys from `existing`
    ///
    /// Fails when the existing documents already violate a new unique index.
    pub(crate) fn create<'a, I>(&mut self, index: &IndexSpec, existing: I) -> TelemetryResult<()>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        if let Some(current) = self.specs.iter().find(|s| s.name == index.name) {
            if current == index {
                return Ok(());
            }
            return Err(TelemetryError::Schema(format!(
                "index {} already exists with different options",
                index.name
            )));
        }

        if index.unique {
            let mut keys = HashSet::new();
            for document in existing {
                if !keys.insert(index_key(document, &index.keys)) {
                    return Err(TelemetryError::Schema(format!(
                        "existing documents violate unique index {}",
                        index.name
                    )));
                }
            }
            self.seen.insert(index.name.clone(), keys);
        }

        self.specs.push(index.clone());
        Ok(())
    }

    /// Record `document` if it is unique under every unique index
    pub(crate) fn admit(&mut self, document: &Document) -> bool {
        let keys: Vec<(String, String)> = self
            .specs
            .iter()
            .filter(|s| s.unique)
            .map(|s| (s.name.clone(), index_key(document, &s.keys)))
            .collect();

        let clash = keys
            .iter()
            .any(|(name, key)| self.seen.get(name).map_or(false, |set| set.contains(key)));
        if clash {
            return false;
        }

        for (name, key) in keys {
            self.seen.entry(name).or_default().insert(key);
        }
        true
    }
}
