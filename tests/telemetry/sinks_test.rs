/*!
 * Hub and Sink Tests
 */

use super::common::event;
use parking_lot::Mutex;
use runner_telemetry::telemetry::sinks::console::render_line;
use runner_telemetry::{
    fields, ConsoleSink, Level, MemorySink, Sink, SinkFilter, TelemetryError, TelemetryHub, TelemetryResult, Tracer, Value,
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct ClosedPipe;

impl Write for ClosedPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }
}

/// Counts calls and fails every emit
#[derive(Default)]
struct FlakySink {
    emits: AtomicUsize,
    flushes: AtomicUsize,
}

impl Sink for FlakySink {
    fn name(&self) -> &str {
        "flaky"
    }

    fn enabled(&self, _channel: &str, _level: Level, _name: Option<&str>) -> bool {
        true
    }

    fn emit(&self, _event: &runner_telemetry::Event) -> TelemetryResult<()> {
        self.emits.fetch_add(1, Ordering::SeqCst);
        Err(TelemetryError::Write("store unavailable".into()))
    }

    fn flush(&self) -> TelemetryResult<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        panic!("flush exploded")
    }
}

#[test]
fn test_console_writes_one_line_per_event() {
    let buffer = SharedBuffer::default();
    let sink = Arc::new(ConsoleSink::with_writer(
        SinkFilter::new(["ops"], Level::Info),
        Box::new(buffer.clone()),
    ));
    let hub = TelemetryHub::with_sinks(vec![sink]);

    hub.emit(&event("trace-a", 1, "ops"));
    hub.emit(&event("trace-a", 2, "audit"));

    let out = buffer.contents();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("[INFO][ops][runner=runner-test][trace=trace-a][event_seq=1][span=0000000…]"));
    assert!(lines[0].ends_with("pipeline.stage_finished stage=model duration_ms=3"));
}

#[test]
fn test_console_survives_closed_stream() {
    let sink = ConsoleSink::with_writer(SinkFilter::default(), Box::new(ClosedPipe));
    assert!(sink.emit(&event("t", 1, "ops")).is_ok());
    assert!(sink.flush().is_ok());
}

#[test]
fn test_console_summary_picks_curated_keys() {
    let mut ev = event("t", 9, "ops");
    ev.attributes = Some(fields! { "symbol" => "EURUSD", "ignored" => "x" });
    ev.data = fields! { "score" => 0.75, "side" => "buy", "noise" => 1 };
    ev.span_id = None;

    let line = render_line(&ev);
    assert!(line.ends_with("pipeline.stage_finished symbol=EURUSD score=0.75 side=buy"));
    assert!(!line.contains("[span="));
}

#[test]
fn test_failing_sink_does_not_starve_memory_sink() {
    let flaky = Arc::new(FlakySink::default());
    let memory = Arc::new(MemorySink::default());
    let hub = TelemetryHub::with_sinks(vec![flaky.clone(), memory.clone()]);

    for seq in 1..=3 {
        hub.emit(&event("t", seq, "ops"));
    }
    hub.flush();
    hub.close();

    assert_eq!(flaky.emits.load(Ordering::SeqCst), 3);
    assert_eq!(flaky.flushes.load(Ordering::SeqCst), 2);
    assert_eq!(memory.len(), 3);
}

#[test]
fn test_sink_filters_are_independent() {
    let audit = Arc::new(MemorySink::new(SinkFilter::new(["audit"], Level::Info)));
    let debug = Arc::new(MemorySink::new(SinkFilter::new(["debug"], Level::Debug)));
    let off = Arc::new(MemorySink::new(SinkFilter::default().with_enabled(false)));
    let hub = TelemetryHub::with_sinks(vec![audit.clone(), debug.clone(), off.clone()]);
    let tracer = Tracer::new(hub, "r", "t");

    tracer.emit("a", Level::Info, "audit", None, None);
    tracer.emit("d", Level::Debug, "debug", None, None);
    tracer.emit("o", Level::Info, "ops", None, None);

    assert_eq!(audit.names(), vec!["a".to_string()]);
    assert_eq!(debug.names(), vec!["d".to_string()]);
    assert!(off.is_empty());
    assert_eq!(tracer.events_emitted(), 2);
}

#[test]
fn test_attribute_layering() {
    let memory = Arc::new(MemorySink::default());
    let hub = TelemetryHub::with_sinks(vec![memory.clone()]).child(fields! {
        "component" => "hub",
        "layer" => "hub",
        "host" => "h1",
    });
    let tracer = Tracer::new(hub, "r", "t").child(fields! { "layer" => "tracer", "stage" => "s" });

    tracer.emit("x", Level::Info, "ops", Some(fields! { "stage" => "call" }), None);

    let ev = &memory.events()[0];
    assert_eq!(ev.attribute("host"), Some(&Value::from("h1")));
    assert_eq!(ev.attribute("layer"), Some(&Value::from("tracer")));
    assert_eq!(ev.attribute("stage"), Some(&Value::from("call")));
}

#[test]
fn test_memory_sink_take_drains() {
    let sink = MemorySink::default();
    sink.emit(&event("t", 1, "ops")).unwrap();
    assert_eq!(sink.take().len(), 1);
    assert!(sink.is_empty());
}
