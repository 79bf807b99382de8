/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the telemetry engine
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Telemetry errors with serialization support
///
/// None of these ever reach business code through the emission API. They are
/// returned by sinks and stores so the hub can report them on the local
/// diagnostics channel before discarding them.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum TelemetryError {
    #[error("Invalid telemetry level: {0}")]
    #[diagnostic(
        code(telemetry::invalid_level),
        help("Use one of DEBUG, INFO, WARN or ERROR.")
    )]
    InvalidLevel(String),

    #[error("Invalid telemetry configuration: {0}")]
    #[diagnostic(
        code(telemetry::config),
        help("Check the telemetry section of the runner configuration.")
    )]
    Config(String),

    #[error("Unsupported store: {0}")]
    #[diagnostic(
        code(telemetry::unsupported_store),
        help("Relational journals accept sqlite:// DSNs; document journals accept mongodb://, mongodb+srv://, memory://, file:// or jsonl:// URIs.")
    )]
    UnsupportedStore(String),

    #[error("Store connection failed: {0}")]
    #[diagnostic(
        code(telemetry::connection),
        help("The journal store is unreachable. Buffered events are discarded until it comes back.")
    )]
    Connection(String),

    #[error("Schema setup failed: {0}")]
    #[diagnostic(
        code(telemetry::schema),
        help("The journal table or indexes could not be created. Check store permissions.")
    )]
    Schema(String),

    #[error("Journal write failed: {0}")]
    #[diagnostic(code(telemetry::write))]
    Write(String),

    #[error("Event serialization failed: {0}")]
    #[diagnostic(code(telemetry::serialization))]
    Serialization(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(telemetry::io))]
    Io(String),

    #[error("{dropped} buffered telemetry events dropped: {reason}")]
    #[diagnostic(
        code(telemetry::dropped),
        help("Journal durability is best-effort; failed batches are not retried.")
    )]
    Dropped { dropped: usize, reason: String },
}

impl TelemetryError {
    /// Wrap a failure that cost us a buffered batch
    pub fn dropped(dropped: usize, cause: &TelemetryError) -> Self {
        TelemetryError::Dropped {
            dropped,
            reason: cause.to_string(),
        }
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        TelemetryError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Io(err.to_string())
    }
}
