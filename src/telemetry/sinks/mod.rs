/*!
 * Sinks
 * Pluggable event consumers with independent gating
 *
 * A sink decides for itself whether it wants an event (`enabled`) and what to
 * do with it (`emit`). The hub calls `enabled` first and only then `emit`.
 * Errors returned here are reported on the local diagnostics channel by the
 * hub and never reach the code that emitted the event.
 */

pub mod console;
pub mod document;
mod filter;
pub mod memory;
pub mod relational;

pub use console::ConsoleSink;
pub use document::DocumentJournalSink;
pub use filter::SinkFilter;
pub use memory::MemorySink;
pub use relational::RelationalJournalSink;

use crate::core::errors::TelemetryResult;
use crate::telemetry::events::{Event, Level};

/// Consumer contract for telemetry events
pub trait Sink: Send + Sync {
    /// Short label used in diagnostics
    fn name(&self) -> &str;

    /// Whether an event with this channel / level (and optionally name) is wanted
    fn enabled(&self, channel: &str, level: Level, name: Option<&str>) -> bool;

    /// Consume one event
    fn emit(&self, event: &Event) -> TelemetryResult<()>;

    /// Persist anything buffered
    fn flush(&self) -> TelemetryResult<()> {
        Ok(())
    }

    /// Flush and release resources
    fn close(&self) -> TelemetryResult<()> {
        self.flush()
    }
}
