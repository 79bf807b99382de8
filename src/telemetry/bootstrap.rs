/*!
 * Bootstrap
 * Wire configured sinks into a hub
 *
 * A sink whose store cannot be selected is left out with a warning; the rest
 * of the hub is still built. Stores themselves are opened lazily by the sinks.
 */

use crate::config::{DocumentJournalConfig, RelationalJournalConfig, TelemetryConfig};
use crate::core::errors::{TelemetryError, TelemetryResult};
use crate::telemetry::hub::TelemetryHub;
use crate::telemetry::sinks::document::connector_from_uri;
use crate::telemetry::sinks::relational::{JournalConnector, JournalSchema};
use crate::telemetry::sinks::{ConsoleSink, DocumentJournalSink, RelationalJournalSink, Sink};
use std::sync::Arc;
use tracing::{info, warn};

/// Choose the relational store for a DSN
pub fn relational_connector(dsn: &str) -> TelemetryResult<Arc<dyn JournalConnector>> {
    #[cfg(feature = "sqlite")]
    {
        use crate::telemetry::sinks::relational::SqliteConnector;
        Ok(Arc::new(SqliteConnector::from_dsn(dsn)?))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Err(TelemetryError::UnsupportedStore(format!(
            "relational journal DSN {:?} (built without sqlite)",
            dsn
        )))
    }
}

fn relational_sink(config: &RelationalJournalConfig) -> TelemetryResult<RelationalJournalSink> {
    let connector = relational_connector(&config.dsn)?;
    let schema = JournalSchema::new(config.table.clone())?;
    Ok(RelationalJournalSink::new(connector, schema, config.filter()).with_batch_size(config.batch_size))
}

fn document_sink(config: &DocumentJournalConfig) -> TelemetryResult<DocumentJournalSink> {
    let connector = connector_from_uri(&config.uri, &config.database, &config.collection)?;
    Ok(DocumentJournalSink::new(connector, config.filter()).with_batch_size(config.batch_size))
}

fn skip(kind: &str, error: &TelemetryError) {
    warn!(sink = kind, error = %error, "telemetry sink not installed");
}

/// Build the process hub from configuration
pub fn build_hub(config: &TelemetryConfig) -> TelemetryHub {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

    if config.console.enabled {
        sinks.push(Arc::new(ConsoleSink::stdout(config.console.filter())));
    }

    if let Some(relational) = config.relational.as_ref().filter(|c| c.enabled) {
        match relational_sink(relational) {
            Ok(sink) => sinks.push(Arc::new(sink)),
            Err(e) => skip("relational_journal", &e),
        }
    }

    if let Some(document) = config.document.as_ref().filter(|c| c.enabled) {
        match document_sink(document) {
            Ok(sink) => sinks.push(Arc::new(sink)),
            Err(e) => skip("document_journal", &e),
        }
    }

    let names: Vec<&str> = sinks.iter().map(|s| s.name()).collect();
    info!(sinks = ?names, "telemetry hub ready");

    TelemetryHub::with_sinks(sinks)
}
