/*!
 * Runner Telemetry Library
 * Trace-oriented telemetry engine for the runner process
 */

pub mod config;
pub mod core;
pub mod telemetry;

// Re-exports
pub use crate::config::{ConsoleSinkConfig, DocumentJournalConfig, RelationalJournalConfig, TelemetryConfig};
pub use crate::core::errors::{TelemetryError, TelemetryResult};
pub use crate::core::types::{Fields, Value};
pub use telemetry::{
    build_hub, init_tracing, ConsoleSink, DocumentJournalSink, Event, EventBuilder, Level, MemorySink,
    RelationalJournalSink, Sink, SinkFilter, Span, SpanContext, SpanGuard, TelemetryHub, TelemetryProvider,
    Tracer, SCHEMA_VERSION,
};
