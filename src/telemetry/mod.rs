/*!
 * Telemetry
 * Trace-oriented event emission, fan-out and sinks
 */

pub mod bootstrap;
pub mod events;
pub mod hub;
pub mod ids;
pub mod logging;
pub mod provider;
pub mod sinks;
pub mod span;
pub mod trace;
pub mod tracer;

pub use bootstrap::build_hub;
pub use events::{Event, Level, SCHEMA_VERSION};
pub use hub::TelemetryHub;
pub use logging::init_tracing;
pub use provider::TelemetryProvider;
pub use sinks::{ConsoleSink, DocumentJournalSink, MemorySink, RelationalJournalSink, Sink, SinkFilter};
pub use span::{Span, SpanGuard};
pub use trace::{ContextGuard, SpanContext, TraceState, WithSpanContext};
pub use tracer::{EventBuilder, Tracer};
