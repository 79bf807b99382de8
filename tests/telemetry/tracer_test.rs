/*!
 * Tracer and Span Tests
 */

use super::common::memory_tracer;
use pretty_assertions::assert_eq;
use runner_telemetry::{fields, Fields, Level, SpanContext, Value};

#[derive(Debug)]
struct FetchError(&'static str);

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fetch failed: {}", self.0)
    }
}

#[test]
fn test_child_handles_share_one_sequence() {
    let (tracer, memory) = memory_tracer();
    let a = tracer.child(fields! { "component" => "a" });
    let b = a.child(fields! { "component" => "b" });
    let c = tracer.child(Fields::new());

    a.emit("a", Level::Info, "ops", None, None);
    b.emit("b", Level::Info, "ops", None, None);
    c.emit("c", Level::Info, "ops", None, None);

    let seqs: Vec<u64> = memory.events().iter().map(|e| e.event_seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(memory.events()[1].attribute("component"), Some(&Value::from("b")));
}

#[test]
fn test_nested_spans() {
    let (tracer, memory) = memory_tracer();

    tracer
        .span("outer", "ops", Level::Info)
        .run(|| {
            tracer.span("inner", "ops", Level::Info).run(|| {
                tracer.emit("x", Level::Info, "ops", None, None);
                Ok::<_, FetchError>(())
            })
        })
        .unwrap();

    let events = memory.events();
    let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["outer.started", "inner.started", "x", "inner.finished", "outer.finished"]
    );

    let outer = events[0].span_id.clone();
    let inner = events[1].span_id.clone();
    assert_eq!(events[0].parent_span_id, None);
    assert_eq!(events[1].parent_span_id, outer);
    assert_eq!(events[2].span_id, inner);
    assert_eq!(events[2].parent_span_id, outer);
    assert_eq!(events[3].span_id, inner);
    assert_eq!(events[4].span_id, outer);

    let seqs: Vec<u64> = events.iter().map(|e| e.event_seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_failed_span_pops_stack_and_propagates() {
    let (tracer, memory) = memory_tracer();

    let result: Result<(), FetchError> = tracer
        .span("fetch", "ops", Level::Info)
        .run(|| Err(FetchError("timeout")));

    assert_eq!(result.unwrap_err().0, "timeout");
    assert!(SpanContext::current().is_empty());

    tracer.emit("after", Level::Info, "ops", None, None);

    let events = memory.events();
    let failed: Vec<_> = events.iter().filter(|e| e.name == "fetch.failed").collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].level, Level::Error);
    assert_eq!(failed[0].data["status"], Value::from("error"));
    assert_eq!(failed[0].data["exception_type"], Value::from("FetchError"));
    assert_eq!(failed[0].data["message"], Value::from("fetch failed: timeout"));
    assert!(failed[0].data["duration_ms"].as_i64().unwrap() >= 0);

    let after = events.last().unwrap();
    assert_eq!(after.span_id, None);
    assert_eq!(after.parent_span_id, None);
}

#[test]
fn test_finished_span_reports_duration_and_mono() {
    let (tracer, memory) = memory_tracer();
    {
        let _span = tracer.span("sleepy", "ops", Level::Info).enter();
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    let events = memory.events();
    let started = &events[0];
    let finished = &events[1];
    assert_eq!(finished.name, "sleepy.finished");
    assert_eq!(finished.data["status"], Value::from("ok"));
    assert!(finished.data["duration_ms"].as_i64().unwrap() >= 19);
    assert!(finished.mono_ns.unwrap() > started.mono_ns.unwrap());
}

#[test]
fn test_debug_gating_keeps_sequence_contiguous() {
    let (tracer, memory) = memory_tracer();

    tracer.emit("kept", Level::Info, "ops", None, None);
    tracer.emit("unrouted", Level::Info, "nobody-listens", None, None);
    tracer.emit("kept", Level::Debug, "debug", None, None);
    tracer.emit("kept", Level::Warn, "audit", None, None);

    assert!(!tracer.enabled("nobody-listens", Level::Error));
    let seqs: Vec<u64> = memory.events().iter().map(|e| e.event_seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[test]
fn test_span_on_unrouted_channel_still_scopes_work() {
    let (tracer, memory) = memory_tracer();

    let _quiet = tracer.span("quiet", "nobody-listens", Level::Info).enter();
    tracer.emit("inside", Level::Info, "ops", None, None);

    let events = memory.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].span_id.as_deref(), Some("0000000000000001"));
}

#[test]
fn test_noop_tracer_accepts_everything_silently() {
    let tracer = runner_telemetry::Tracer::noop();
    let value = tracer
        .span("anything", "ops", Level::Info)
        .run(|| Ok::<_, FetchError>(5))
        .unwrap();
    assert_eq!(value, 5);
    assert_eq!(tracer.events_emitted(), 0);
}
