/*!
 * Telemetry Limits and Constants
 *
 * Centralized location for identifier widths, batch defaults and rendering
 * limits. Grouped by the component that consumes them.
 */

// =============================================================================
// IDENTITY
// =============================================================================

/// Maximum length of a sanitized runner id embedded in trace ids
pub const RUNNER_ID_MAX_LEN: usize = 80;

/// Runner id used when the configured one sanitizes to nothing
pub const RUNNER_ID_FALLBACK: &str = "runner-unknown";

/// Span ids are the trace-local span counter rendered as this many hex digits
pub const SPAN_ID_WIDTH: usize = 16;

/// Minimum hex digits for the per-process trace counter in trace ids
pub const TRACE_SEQ_MIN_WIDTH: usize = 4;

// =============================================================================
// JOURNAL SINKS
// =============================================================================

/// Default flush threshold for the relational journal
pub const RELATIONAL_DEFAULT_BATCH_SIZE: usize = 100;

/// Default flush threshold for the document journal
pub const DOCUMENT_DEFAULT_BATCH_SIZE: usize = 200;

/// Default table / collection name for both journals
pub const JOURNAL_DEFAULT_TABLE: &str = "execution_journal_events";

/// Default document database name
pub const DOCUMENT_DEFAULT_DATABASE: &str = "runner";

// =============================================================================
// CONSOLE RENDERING
// =============================================================================

/// Max chars for a summarized attribute / data value
pub const CONSOLE_VALUE_LIMIT: usize = 40;

/// Max chars for runner and trace ids in the line header
pub const CONSOLE_ID_LIMIT: usize = 18;

/// Max chars for span ids in the line header
pub const CONSOLE_SPAN_LIMIT: usize = 8;

/// Number of data keys listed when no curated key matched
pub const CONSOLE_FALLBACK_KEYS: usize = 8;
