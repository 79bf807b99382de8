/*!
 * Shared fixtures
 */

use runner_telemetry::{fields, Event, Level, MemorySink, SinkFilter, TelemetryHub, Tracer, SCHEMA_VERSION};
use std::sync::Arc;

/// Tracer over a memory sink accepting `audit` / `ops` / `debug` at DEBUG
pub fn memory_tracer() -> (Tracer, Arc<MemorySink>) {
    let memory = Arc::new(MemorySink::new(SinkFilter::new(["audit", "ops", "debug"], Level::Debug)));
    let hub = TelemetryHub::with_sinks(vec![memory.clone()]);
    (Tracer::new(hub, "runner-test", "trace-test"), memory)
}

/// Hand-built envelope for feeding sinks directly
pub fn event(trace_id: &str, event_seq: u64, channel: &str) -> Event {
    Event {
        schema_version: SCHEMA_VERSION,
        runner_id: "runner-test".into(),
        trace_id: trace_id.into(),
        event_seq,
        ts_utc: time::OffsetDateTime::now_utc(),
        mono_ns: Some(event_seq * 1_000),
        span_id: Some("0000000000000001".into()),
        parent_span_id: None,
        name: "pipeline.stage_finished".into(),
        level: Level::Info,
        channel: channel.into(),
        attributes: Some(fields! { "stage" => "model" }),
        data: fields! { "duration_ms" => 3, "status" => "ok" },
    }
}
