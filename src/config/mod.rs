/*!
 * Telemetry Configuration
 *
 * Resolution order (highest priority first):
 *
 * 1. Environment variables (`RUNNER_*`)
 * 2. JSON config file
 * 3. Built-in defaults
 *
 * | Variable | Maps to |
 * |----------|---------|
 * | `RUNNER_ID` | `runner_id` |
 * | `RUNNER_TELEMETRY_CONSOLE` | `console.enabled` |
 * | `RUNNER_JOURNAL_DSN` | `relational.dsn` |
 * | `RUNNER_DOCUMENT_URI` | `document.uri` |
 */

use crate::core::errors::{TelemetryError, TelemetryResult};
use crate::core::limits::{
    DOCUMENT_DEFAULT_BATCH_SIZE, DOCUMENT_DEFAULT_DATABASE, JOURNAL_DEFAULT_TABLE, RELATIONAL_DEFAULT_BATCH_SIZE,
};
use crate::telemetry::events::Level;
use crate::telemetry::sinks::relational::schema::is_identifier;
use crate::telemetry::sinks::SinkFilter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub const ENV_RUNNER_ID: &str = "RUNNER_ID";
pub const ENV_CONSOLE: &str = "RUNNER_TELEMETRY_CONSOLE";
pub const ENV_JOURNAL_DSN: &str = "RUNNER_JOURNAL_DSN";
pub const ENV_DOCUMENT_URI: &str = "RUNNER_DOCUMENT_URI";

fn default_runner_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("runner-{}", &id[..8])
}

fn journal_channels() -> BTreeSet<String> {
    ["audit", "ops"].into_iter().map(String::from).collect()
}

fn console_channels() -> BTreeSet<String> {
    ["ops"].into_iter().map(String::from).collect()
}

fn enabled() -> bool {
    true
}

fn journal_table() -> String {
    JOURNAL_DEFAULT_TABLE.to_string()
}

fn relational_batch_size() -> usize {
    RELATIONAL_DEFAULT_BATCH_SIZE
}

fn document_batch_size() -> usize {
    DOCUMENT_DEFAULT_BATCH_SIZE
}

fn document_database() -> String {
    DOCUMENT_DEFAULT_DATABASE.to_string()
}

/// Human-readable console output; off unless asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSinkConfig {
    pub enabled: bool,
    pub channels: BTreeSet<String>,
    pub min_level: Level,
}

impl Default for ConsoleSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channels: console_channels(),
            min_level: Level::Info,
        }
    }
}

impl ConsoleSinkConfig {
    pub fn filter(&self) -> SinkFilter {
        SinkFilter::new(self.channels.iter().cloned(), self.min_level).with_enabled(self.enabled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationalJournalConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "journal_channels")]
    pub channels: BTreeSet<String>,
    #[serde(default)]
    pub min_level: Level,
    #[serde(default = "relational_batch_size")]
    pub batch_size: usize,
    /// `sqlite://<path>` or `sqlite::memory:`
    pub dsn: String,
    #[serde(default = "journal_table")]
    pub table: String,
}

impl RelationalJournalConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            enabled: true,
            channels: journal_channels(),
            min_level: Level::Info,
            batch_size: RELATIONAL_DEFAULT_BATCH_SIZE,
            dsn: dsn.into(),
            table: journal_table(),
        }
    }

    pub fn filter(&self) -> SinkFilter {
        SinkFilter::new(self.channels.iter().cloned(), self.min_level).with_enabled(self.enabled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentJournalConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "journal_channels")]
    pub channels: BTreeSet<String>,
    #[serde(default)]
    pub min_level: Level,
    #[serde(default = "document_batch_size")]
    pub batch_size: usize,
    /// `mongodb://...`, `memory://`, `file://<dir>` or `jsonl://<dir>`
    pub uri: String,
    #[serde(default = "document_database")]
    pub database: String,
    #[serde(default = "journal_table")]
    pub collection: String,
}

impl DocumentJournalConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            enabled: true,
            channels: journal_channels(),
            min_level: Level::Info,
            batch_size: DOCUMENT_DEFAULT_BATCH_SIZE,
            uri: uri.into(),
            database: document_database(),
            collection: journal_table(),
        }
    }

    pub fn filter(&self) -> SinkFilter {
        SinkFilter::new(self.channels.iter().cloned(), self.min_level).with_enabled(self.enabled)
    }
}

/// Everything needed to build the hub at process start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub runner_id: String,
    pub console: ConsoleSinkConfig,
    pub relational: Option<RelationalJournalConfig>,
    pub document: Option<DocumentJournalConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            runner_id: default_runner_id(),
            console: ConsoleSinkConfig::default(),
            relational: None,
            document: None,
        }
    }
}

impl TelemetryConfig {
    pub fn from_json_str(raw: &str) -> TelemetryResult<Self> {
        serde_json::from_str(raw).map_err(|e| TelemetryError::Config(format!("invalid telemetry config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> TelemetryResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// Apply `RUNNER_*` variables that are set
    ///
    /// A DSN or URI from the environment creates the matching journal section
    /// with defaults when the file did not configure one.
    pub fn apply_env_overrides(&mut self) -> TelemetryResult<()> {
        if let Some(val) = read_env(ENV_RUNNER_ID) {
            self.runner_id = val;
        }
        if let Some(val) = read_env(ENV_CONSOLE) {
            self.console.enabled = parse_bool(ENV_CONSOLE, &val)?;
        }
        if let Some(val) = read_env(ENV_JOURNAL_DSN) {
            match self.relational.as_mut() {
                Some(relational) => relational.dsn = val,
                None => self.relational = Some(RelationalJournalConfig::new(val)),
            }
        }
        if let Some(val) = read_env(ENV_DOCUMENT_URI) {
            match self.document.as_mut() {
                Some(document) => document.uri = val,
                None => self.document = Some(DocumentJournalConfig::new(val)),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> TelemetryResult<()> {
        if let Some(relational) = &self.relational {
            if relational.batch_size == 0 {
                return Err(TelemetryError::Config("relational.batch_size must be at least 1".into()));
            }
            if relational.dsn.trim().is_empty() {
                return Err(TelemetryError::Config("relational.dsn must not be empty".into()));
            }
            if !is_identifier(&relational.table) {
                return Err(TelemetryError::Config(format!(
                    "relational.table {:?} is not a plain identifier",
                    relational.table
                )));
            }
        }

        if let Some(document) = &self.document {
            if document.batch_size == 0 {
                return Err(TelemetryError::Config("document.batch_size must be at least 1".into()));
            }
            if document.uri.trim().is_empty() {
                return Err(TelemetryError::Config("document.uri must not be empty".into()));
            }
            for (field, value) in [("database", &document.database), ("collection", &document.collection)] {
                if !is_identifier(value) {
                    return Err(TelemetryError::Config(format!(
                        "document.{} {:?} is not a plain identifier",
                        field, value
                    )));
                }
            }
        }
        Ok(())
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(var_name: &str, val: &str) -> TelemetryResult<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TelemetryError::Config(format!(
            "invalid value for {}: expected boolean, got {:?}",
            var_name, val
        ))),
    }
}
