/*!
 * Identity Generation
 *
 * Trace ids are human-debuggable and sort lexically by creation time:
 * `<runner>-<YYYYMMDDHHMMSSffffff>-<trace_seq hex>`.
 * Span ids are the trace-local span counter as fixed-width hex.
 */

use crate::core::limits::{RUNNER_ID_FALLBACK, RUNNER_ID_MAX_LEN, SPAN_ID_WIDTH, TRACE_SEQ_MIN_WIDTH};
use time::{OffsetDateTime, UtcOffset};

#[inline]
fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Restrict a runner id to `[a-zA-Z0-9._-]`
///
/// Each run of disallowed characters collapses to a single `_`. The result is
/// truncated to [`RUNNER_ID_MAX_LEN`]; blank input yields [`RUNNER_ID_FALLBACK`].
pub fn sanitize_runner_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return RUNNER_ID_FALLBACK.to_string();
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut in_bad_run = false;
    for c in trimmed.chars() {
        if is_safe(c) {
            out.push(c);
            in_bad_run = false;
        } else if !in_bad_run {
            out.push('_');
            in_bad_run = true;
        }
    }

    // ASCII only at this point, byte truncation is char-safe
    out.truncate(RUNNER_ID_MAX_LEN);
    out
}

/// UTC timestamp as `YYYYMMDDHHMMSSffffff` (microsecond resolution)
pub fn format_ts_compact(ts: OffsetDateTime) -> String {
    let ts = ts.to_offset(UtcOffset::UTC);
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}{:06}",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
        ts.microsecond()
    )
}

/// Compose a trace id from runner, creation time and per-process trace counter
pub fn new_trace_id(runner_id: &str, ts_utc: OffsetDateTime, trace_seq: u64) -> String {
    format!(
        "{}-{}-{:0width$x}",
        sanitize_runner_id(runner_id),
        format_ts_compact(ts_utc),
        trace_seq,
        width = TRACE_SEQ_MIN_WIDTH
    )
}

/// Fixed-width hex rendering of the trace-local span counter
#[inline]
pub fn new_span_id(span_seq: u64) -> String {
    format!("{:0width$x}", span_seq, width = SPAN_ID_WIDTH)
}
