/*!
 * Clocks
 * Wall-clock UTC for audit timestamps, process-anchored monotonic clock for durations
 */

use std::sync::OnceLock;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Current wall-clock time in UTC
#[inline]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Monotonic nanoseconds since the first call in this process
///
/// Immune to wall-clock adjustments; only meaningful for differences.
#[inline]
pub fn mono_ns() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

/// Whole milliseconds between two monotonic readings, rounded, never negative
#[inline]
pub fn elapsed_ms(start_ns: u64, end_ns: u64) -> u64 {
    (end_ns.saturating_sub(start_ns) + 500_000) / 1_000_000
}

/// RFC 3339 rendering used by journals and documents
pub fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

/// Inverse of [`format_rfc3339`]
pub fn parse_rfc3339(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).ok()
}
