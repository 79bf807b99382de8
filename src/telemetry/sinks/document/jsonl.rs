/*!
 * JSON-Lines Document Store
 *
 * One append-only file per collection at `<root>/<database>/<collection>.jsonl`.
 * Unique indexes are rebuilt from the file contents when created, so
 * dedupe holds across process restarts.
 */

use super::store::{Document, DocumentCollection, DocumentConnector, IndexSpec, InsertManyOutcome, UniqueIndexes};
use crate::core::errors::{TelemetryError, TelemetryResult};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonlDocumentConnector {
    root: PathBuf,
    database: String,
    collection: String,
}

impl JsonlDocumentConnector {
    pub fn new(root: impl Into<PathBuf>, database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            database: database.into(),
            collection: collection.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root
            .join(&self.database)
            .join(format!("{}.jsonl", self.collection))
    }
}

impl DocumentConnector for JsonlDocumentConnector {
    fn describe(&self) -> String {
        format!("jsonl://{}", self.path().display())
    }

    fn connect(&self) -> TelemetryResult<Box<dyn DocumentCollection>> {
        let path = self.path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| TelemetryError::Connection(format!("{}: {}", dir.display(), e)))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TelemetryError::Connection(format!("{}: {}", path.display(), e)))?;

        Ok(Box::new(JsonlCollection {
            path,
            writer: Some(BufWriter::new(file)),
            indexes: UniqueIndexes::default(),
        }))
    }
}

struct JsonlCollection {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    indexes: UniqueIndexes,
}

/// Every parseable document currently in the file
fn read_documents(path: &Path) -> TelemetryResult<Vec<Document>> {
    let reader = BufReader::new(File::open(path)?);
    let mut documents = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Document>(&line) {
            Ok(document) => documents.push(document),
            Err(e) => debug!(path = %path.display(), line = lineno + 1, error = %e, "skipping malformed journal line"),
        }
    }
    Ok(documents)
}

impl DocumentCollection for JsonlCollection {
    fn create_index(&mut self, index: &IndexSpec) -> TelemetryResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        let existing = if index.unique {
            read_documents(&self.path)?
        } else {
            Vec::new()
        };
        self.indexes.create(index, existing.iter())
    }

    fn insert_many_unordered(&mut self, documents: &[Document]) -> TelemetryResult<InsertManyOutcome> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TelemetryError::Connection("collection already closed".into()))?;

        let mut outcome = InsertManyOutcome::default();
        for document in documents {
            if !self.indexes.admit(document) {
                outcome.duplicates += 1;
                continue;
            }
            let line = serde_json::to_string(document)?;
            writeln!(writer, "{}", line).map_err(|e| TelemetryError::Write(e.to_string()))?;
            outcome.inserted += 1;
        }

        writer.flush().map_err(|e| TelemetryError::Write(e.to_string()))?;
        Ok(outcome)
    }

    fn close(&mut self) -> TelemetryResult<()> {
        match self.writer.take() {
            Some(mut writer) => Ok(writer.flush()?),
            None => Ok(()),
        }
    }
}
