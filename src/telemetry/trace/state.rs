/*!
 * Trace State
 * Counters shared by every tracer handle derived from one trace
 */

use crate::telemetry::ids::new_span_id;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Counters {
    event_seq: u64,
    span_seq: u64,
}

/// Mutable, shared state for one trace
///
/// Shared through `Arc` by `Tracer::child()`; never copied. Both counters sit
/// behind one lock so sequence allocation is totally ordered per trace.
#[derive(Debug, Default)]
pub struct TraceState {
    counters: Mutex<Counters>,
}

impl TraceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next event sequence number (first call returns 1)
    #[inline]
    pub fn next_event_seq(&self) -> u64 {
        let mut counters = self.counters.lock();
        counters.event_seq += 1;
        counters.event_seq
    }

    /// Allocate the next span id (first call returns `0000000000000001`)
    #[inline]
    pub fn next_span_id(&self) -> String {
        let seq = {
            let mut counters = self.counters.lock();
            counters.span_seq += 1;
            counters.span_seq
        };
        new_span_id(seq)
    }

    /// Number of event sequence numbers handed out so far
    pub fn events_allocated(&self) -> u64 {
        self.counters.lock().event_seq
    }

    /// Number of span ids handed out so far
    pub fn spans_allocated(&self) -> u64 {
        self.counters.lock().span_seq
    }
}
