/*!
 * Console Sink
 * One grep-friendly line per event with a curated field summary
 */

use super::{Sink, SinkFilter};
use crate::core::errors::TelemetryResult;
use crate::core::limits::{
    CONSOLE_FALLBACK_KEYS, CONSOLE_ID_LIMIT, CONSOLE_SPAN_LIMIT, CONSOLE_VALUE_LIMIT,
};
use crate::telemetry::events::{Event, Level};
use parking_lot::Mutex;
use std::io::Write;

/// Attribute keys worth surfacing
const SUMMARY_ATTRIBUTE_KEYS: &[&str] = &["component", "stage", "symbol", "model"];

/// Data keys worth surfacing
const SUMMARY_DATA_KEYS: &[&str] = &[
    "dropped_count",
    "passed_count",
    "symbols_count",
    "duration_ms",
    "threshold",
    "score",
    "side",
    "weight",
    "confidence",
    "reason",
];

/// Truncate to `limit` chars, marking the cut with an ellipsis
pub fn shorten(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let mut out: String = value.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Short `key=value` summary of the interesting parts of an event
pub fn summarize(event: &Event) -> String {
    let mut parts = Vec::new();

    if let Some(attributes) = &event.attributes {
        for key in SUMMARY_ATTRIBUTE_KEYS {
            if let Some(value) = attributes.get(*key) {
                if !value.is_blank() {
                    parts.push(format!("{}={}", key, shorten(&value.to_string(), CONSOLE_VALUE_LIMIT)));
                }
            }
        }
    }

    for key in SUMMARY_DATA_KEYS {
        if let Some(value) = event.data.get(*key) {
            parts.push(format!("{}={}", key, shorten(&value.to_string(), CONSOLE_VALUE_LIMIT)));
        }
    }

    if parts.is_empty() && !event.data.is_empty() {
        let keys: Vec<&str> = event
            .data
            .keys()
            .take(CONSOLE_FALLBACK_KEYS)
            .map(String::as_str)
            .collect();
        parts.push(format!("data_keys=[{}]", keys.join(", ")));
    }

    parts.join(" ")
}

/// Render the full console line (without trailing newline)
pub fn render_line(event: &Event) -> String {
    let mut line = format!(
        "[{}][{}][runner={}][trace={}][event_seq={}]",
        event.level,
        event.channel,
        shorten(&event.runner_id, CONSOLE_ID_LIMIT),
        shorten(&event.trace_id, CONSOLE_ID_LIMIT),
        event.event_seq
    );

    if let Some(span_id) = &event.span_id {
        line.push_str(&format!("[span={}]", shorten(span_id, CONSOLE_SPAN_LIMIT)));
    }
    if let Some(parent) = &event.parent_span_id {
        line.push_str(&format!("[parent={}]", shorten(parent, CONSOLE_SPAN_LIMIT)));
    }

    line.push(' ');
    line.push_str(&event.name);

    let summary = summarize(event);
    if !summary.is_empty() {
        line.push(' ');
        line.push_str(&summary);
    }
    line
}

/// Human-friendly console output
///
/// Off by default in configuration. Write failures on the underlying stream
/// are swallowed.
pub struct ConsoleSink {
    filter: SinkFilter,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// Console sink writing to stdout
    pub fn stdout(filter: SinkFilter) -> Self {
        Self::with_writer(filter, Box::new(std::io::stdout()))
    }

    pub fn with_writer(filter: SinkFilter, writer: Box<dyn Write + Send>) -> Self {
        Self {
            filter,
            writer: Mutex::new(writer),
        }
    }

    pub fn filter(&self) -> &SinkFilter {
        &self.filter
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn enabled(&self, channel: &str, level: Level, _name: Option<&str>) -> bool {
        self.filter.accepts(channel, level)
    }

    fn emit(&self, event: &Event) -> TelemetryResult<()> {
        let line = render_line(event);
        let mut writer = self.writer.lock();
        // A closed pipe must not turn into a telemetry error
        let _ = writeln!(writer, "{}", line).and_then(|_| writer.flush());
        Ok(())
    }

    fn flush(&self) -> TelemetryResult<()> {
        let _ = self.writer.lock().flush();
        Ok(())
    }
}
