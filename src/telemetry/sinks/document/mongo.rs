/*!
 * MongoDB Document Store
 * `DocumentConnector` backed by the blocking MongoDB driver
 *
 * `ts_utc` is stored as a native BSON date so time-range queries run on the
 * server. Duplicate-key errors from an unordered bulk insert count as skipped
 * documents; any other write error fails the batch.
 */

use super::store::{Document, DocumentCollection, DocumentConnector, IndexSpec, InsertManyOutcome};
use crate::core::clock::parse_rfc3339;
use crate::core::errors::{TelemetryError, TelemetryResult};
use mongodb::bson::{self, doc, Bson, Document as BsonDocument};
use mongodb::error::ErrorKind;
use mongodb::options::{IndexOptions, InsertManyOptions};
use mongodb::sync::{Client, Collection};
use mongodb::IndexModel;
use serde_json::Value as JsonValue;

/// Server error code for a unique index violation
const DUPLICATE_KEY: i32 = 11000;

/// Opens one journal collection on a MongoDB deployment
#[derive(Clone, PartialEq, Eq)]
pub struct MongoDocumentConnector {
    uri: String,
    database: String,
    collection: String,
}

impl MongoDocumentConnector {
    pub fn new(uri: impl Into<String>, database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// `mongodb://` and `mongodb+srv://` connection strings
    pub fn accepts(uri: &str) -> bool {
        uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://")
    }
}

impl std::fmt::Debug for MongoDocumentConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoDocumentConnector")
            .field("uri", &redact(&self.uri))
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish()
    }
}

/// Connection string with any credentials masked
fn redact(uri: &str) -> String {
    let Some(scheme_end) = uri.find("://") else {
        return uri.to_string();
    };
    let rest = &uri[scheme_end + 3..];
    let authority = &rest[..rest.find('/').unwrap_or(rest.len())];
    match authority.rfind('@') {
        Some(at) => format!("{}://***@{}", &uri[..scheme_end], &rest[at + 1..]),
        None => uri.to_string(),
    }
}

fn connection_error(err: mongodb::error::Error) -> TelemetryError {
    TelemetryError::Connection(err.to_string())
}

impl DocumentConnector for MongoDocumentConnector {
    fn describe(&self) -> String {
        format!(
            "{}/{}.{}",
            redact(&self.uri).trim_end_matches('/'),
            self.database,
            self.collection
        )
    }

    fn connect(&self) -> TelemetryResult<Box<dyn DocumentCollection>> {
        let client = Client::with_uri_str(&self.uri).map_err(connection_error)?;
        let database = client.database(&self.database);
        // Client construction is lazy; ping so an unreachable server fails here
        database.run_command(doc! { "ping": 1 }, None).map_err(connection_error)?;

        Ok(Box::new(MongoCollection {
            collection: database.collection::<BsonDocument>(&self.collection),
        }))
    }
}

struct MongoCollection {
    collection: Collection<BsonDocument>,
}

impl DocumentCollection for MongoCollection {
    fn create_index(&mut self, index: &IndexSpec) -> TelemetryResult<()> {
        let mut keys = BsonDocument::new();
        for key in &index.keys {
            keys.insert(key.clone(), 1i32);
        }
        let model = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().name(index.name.clone()).unique(index.unique).build())
            .build();

        self.collection
            .create_index(model, None)
            .map(|_| ())
            .map_err(|e| TelemetryError::Schema(e.to_string()))
    }

    fn insert_many_unordered(&mut self, documents: &[Document]) -> TelemetryResult<InsertManyOutcome> {
        if documents.is_empty() {
            return Ok(InsertManyOutcome::default());
        }

        let batch = documents
            .iter()
            .map(to_bson_document)
            .collect::<TelemetryResult<Vec<_>>>()?;
        let options = InsertManyOptions::builder().ordered(false).build();

        match self.collection.insert_many(&batch, options) {
            Ok(result) => Ok(InsertManyOutcome {
                inserted: result.inserted_ids.len(),
                duplicates: 0,
            }),
            Err(e) => match e.kind.as_ref() {
                ErrorKind::BulkWrite(failure) if failure.write_concern_error.is_none() => {
                    let codes: Vec<i32> = failure.write_errors.iter().flatten().map(|w| w.code).collect();
                    classify_write_errors(batch.len(), &codes).ok_or_else(|| TelemetryError::Write(e.to_string()))
                }
                _ => Err(TelemetryError::Write(e.to_string())),
            },
        }
    }
}

/// Outcome of a partially failed unordered insert, if every failure was a duplicate
fn classify_write_errors(total: usize, codes: &[i32]) -> Option<InsertManyOutcome> {
    if codes.iter().any(|code| *code != DUPLICATE_KEY) {
        return None;
    }
    Some(InsertManyOutcome {
        inserted: total.saturating_sub(codes.len()),
        duplicates: codes.len(),
    })
}

/// BSON form of a journal document with `ts_utc` as a native date
pub(crate) fn to_bson_document(document: &Document) -> TelemetryResult<BsonDocument> {
    let mut converted = bson::to_document(document).map_err(|e| TelemetryError::Serialization(e.to_string()))?;

    if let Some(ts) = document
        .get("ts_utc")
        .and_then(JsonValue::as_str)
        .and_then(parse_rfc3339)
    {
        let millis = i64::try_from(ts.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX);
        converted.insert("ts_utc", Bson::DateTime(bson::DateTime::from_millis(millis)));
    }
    Ok(converted)
}
