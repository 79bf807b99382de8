/*!
 * Tracer
 * Per-trace emission handle
 *
 * A tracer stamps events with its trace identity, the ambient span stack and
 * a gap-free sequence number, then hands them to the hub. Handles derived
 * with [`Tracer::child`] share one [`TraceState`], so sequencing stays
 * contiguous whichever handle emits.
 *
 * Emission never fails from the caller's point of view: gating happens before
 * any counter moves, and everything after the gate runs under
 * `catch_unwind`.
 */

use crate::core::clock::now_utc;
use crate::core::limits::RUNNER_ID_FALLBACK;
use crate::core::types::Fields;
use crate::telemetry::events::{Event, Level, SCHEMA_VERSION};
use crate::telemetry::hub::TelemetryHub;
use crate::telemetry::span::Span;
use crate::telemetry::trace::{SpanContext, TraceState};
use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

/// Cheap-to-clone handle bound to one trace
#[derive(Clone)]
pub struct Tracer {
    hub: TelemetryHub,
    runner_id: Arc<str>,
    trace_id: Arc<str>,
    base_attributes: Arc<Fields>,
    state: Arc<TraceState>,
}

impl Tracer {
    /// Start a fresh trace with its own counters
    pub fn new(hub: TelemetryHub, runner_id: impl Into<Arc<str>>, trace_id: impl Into<Arc<str>>) -> Self {
        Self {
            hub,
            runner_id: runner_id.into(),
            trace_id: trace_id.into(),
            base_attributes: Arc::new(Fields::new()),
            state: Arc::new(TraceState::new()),
        }
    }

    /// Tracer with no sinks behind it; every emission is gated out
    pub fn noop() -> Self {
        Self::new(TelemetryHub::new(), RUNNER_ID_FALLBACK, "")
    }

    pub fn runner_id(&self) -> &str {
        &self.runner_id
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn base_attributes(&self) -> &Fields {
        &self.base_attributes
    }

    pub fn hub(&self) -> &TelemetryHub {
        &self.hub
    }

    pub(crate) fn state(&self) -> &TraceState {
        &self.state
    }

    /// Sequence numbers handed out on this trace so far
    pub fn events_emitted(&self) -> u64 {
        self.state.events_allocated()
    }

    /// Whether any sink would receive an event on this channel / level
    #[inline]
    pub fn enabled(&self, channel: &str, level: Level) -> bool {
        self.hub.enabled(channel, level)
    }

    /// Handle on the same trace with `attributes` merged over the inherited ones
    pub fn child(&self, attributes: Fields) -> Tracer {
        let mut merged = Fields::clone(&self.base_attributes);
        merged.extend(attributes);

        Tracer {
            hub: self.hub.clone(),
            runner_id: Arc::clone(&self.runner_id),
            trace_id: Arc::clone(&self.trace_id),
            base_attributes: Arc::new(merged),
            state: Arc::clone(&self.state),
        }
    }

    /// Emit one event under the ambient span
    pub fn emit(&self, name: &str, level: Level, channel: &str, attributes: Option<Fields>, data: Option<Fields>) {
        let mut event = self.event(name, level, channel);
        event.attributes = attributes;
        event.emit_with(move || data.unwrap_or_default());
    }

    /// Emit with a payload that is only built when someone is listening
    pub fn emit_with<F>(&self, name: &str, level: Level, channel: &str, data: F)
    where
        F: FnOnce() -> Fields,
    {
        self.event(name, level, channel).emit_with(data);
    }

    /// Event builder for emissions that need explicit overrides
    pub fn event<'a>(&'a self, name: impl Into<Cow<'a, str>>, level: Level, channel: &'a str) -> EventBuilder<'a> {
        EventBuilder {
            tracer: self,
            name: name.into(),
            level,
            channel,
            attributes: None,
            data: None,
            span_id: None,
            parent_span_id: None,
            mono_ns: None,
            ts_utc: None,
        }
    }

    /// Scoped unit of work; nothing happens until it is entered or run
    pub fn span(&self, name: impl Into<String>, channel: impl Into<String>, level: Level) -> Span {
        Span::new(self.clone(), name.into(), channel.into(), level)
    }

    fn dispatch<F>(&self, event: EventBuilder<'_>, data: F)
    where
        F: FnOnce() -> Fields,
    {
        if !self.hub.enabled(event.channel, event.level) {
            return;
        }

        let built = catch_unwind(AssertUnwindSafe(|| {
            let context = SpanContext::current();
            let span_id = event.span_id.or_else(|| context.span_id().map(str::to_owned));
            let parent_span_id = match event.parent_span_id {
                Some(pinned) => pinned,
                None => context.parent_span_id().map(str::to_owned),
            };

            let data = match event.data {
                Some(data) => data,
                None => data(),
            };
            let event_seq = self.state.next_event_seq();

            let mut attributes = Fields::clone(&self.base_attributes);
            if let Some(own) = event.attributes {
                attributes.extend(own);
            }

            let envelope = Event {
                schema_version: SCHEMA_VERSION,
                runner_id: self.runner_id.to_string(),
                trace_id: self.trace_id.to_string(),
                event_seq,
                ts_utc: event.ts_utc.unwrap_or_else(now_utc),
                mono_ns: event.mono_ns,
                span_id,
                parent_span_id,
                name: event.name.into_owned(),
                level: event.level,
                channel: event.channel.to_string(),
                attributes: if attributes.is_empty() { None } else { Some(attributes) },
                data,
            };
            self.hub.emit(&envelope);
        }));

        if built.is_err() {
            debug!(trace_id = %self.trace_id, "telemetry emission panicked, event dropped");
        }
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("runner_id", &self.runner_id)
            .field("trace_id", &self.trace_id)
            .field("base_attributes", &self.base_attributes)
            .finish()
    }
}

/// One pending emission
///
/// Unset identity fields are resolved from the ambient span stack and the
/// clocks at emission time.
#[must_use = "an event builder does nothing until emitted"]
pub struct EventBuilder<'a> {
    tracer: &'a Tracer,
    name: Cow<'a, str>,
    level: Level,
    channel: &'a str,
    attributes: Option<Fields>,
    data: Option<Fields>,
    span_id: Option<String>,
    /// Outer `None` resolves from the ambient stack; `Some(None)` pins "no parent"
    parent_span_id: Option<Option<String>>,
    mono_ns: Option<u64>,
    ts_utc: Option<OffsetDateTime>,
}

impl<'a> EventBuilder<'a> {
    /// Call-site attributes; these win over inherited ones
    pub fn attributes(mut self, attributes: Fields) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn data(mut self, data: Fields) -> Self {
        self.data = Some(data);
        self
    }

    pub fn span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    /// Pin the parent; `None` records a root event whatever the ambient stack holds
    pub fn parent_span_id(mut self, parent_span_id: Option<String>) -> Self {
        self.parent_span_id = Some(parent_span_id);
        self
    }

    pub fn mono_ns(mut self, mono_ns: u64) -> Self {
        self.mono_ns = Some(mono_ns);
        self
    }

    pub fn ts_utc(mut self, ts_utc: OffsetDateTime) -> Self {
        self.ts_utc = Some(ts_utc);
        self
    }

    pub fn emit(self) {
        self.emit_with(Fields::new);
    }

    /// Emit, building `data` only if the event passes the gate and no
    /// payload was set explicitly
    pub fn emit_with<F>(self, data: F)
    where
        F: FnOnce() -> Fields,
    {
        let tracer = self.tracer;
        tracer.dispatch(self, data);
    }
}
