/*!
 * Spans
 *
 * RAII scopes over a unit of work. Entering pushes a fresh span id onto the
 * ambient stack and emits `<name>.started`; leaving emits exactly one of
 * `<name>.finished` or `<name>.failed` and restores the previous stack.
 *
 * Durations come from the monotonic clock. Business errors are reported and
 * handed back unchanged; spans never swallow them.
 */

use crate::core::clock::{elapsed_ms, mono_ns};
use crate::core::types::Fields;
use crate::fields;
use crate::telemetry::events::Level;
use crate::telemetry::trace::{ContextGuard, SpanContext};
use crate::telemetry::tracer::Tracer;
use std::fmt::Display;
use std::future::Future;

/// Short, generic-free name of `T` (`my_crate::FetchError<X>` -> `FetchError`)
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let mut name = full.trim_start_matches('&').trim_start_matches("dyn ");
    if let Some(end) = name.find(|c: char| c == '<' || c == ' ') {
        name = &name[..end];
    }
    name.rsplit("::").next().unwrap_or(name)
}

/// A span that has not started yet
#[must_use = "a span does nothing until entered or run"]
pub struct Span {
    tracer: Tracer,
    name: String,
    channel: String,
    level: Level,
    attributes: Option<Fields>,
    data: Option<Fields>,
}

impl Span {
    pub(crate) fn new(tracer: Tracer, name: String, channel: String, level: Level) -> Self {
        Self {
            tracer,
            name,
            channel,
            level,
            attributes: None,
            data: None,
        }
    }

    /// Attributes carried on every lifecycle event of this span
    pub fn with_attributes(mut self, attributes: Fields) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Payload of the `.started` event
    pub fn with_data(mut self, data: Fields) -> Self {
        self.data = Some(data);
        self
    }

    fn start(self, on_drop: DropOutcome) -> (ActiveSpan, SpanContext) {
        let started_ns = mono_ns();
        let before = SpanContext::current();
        let parent_span_id = before.span_id().map(str::to_owned);
        let span_id = self.tracer.state().next_span_id();
        let context = before.pushed(span_id.clone());

        let mut started = self
            .tracer
            .event(format!("{}.started", self.name), self.level, &self.channel)
            .span_id(span_id.clone())
            .parent_span_id(parent_span_id.clone())
            .mono_ns(started_ns);
        if let Some(attributes) = self.attributes.clone() {
            started = started.attributes(attributes);
        }
        started.data(self.data.unwrap_or_default()).emit();

        let active = ActiveSpan {
            tracer: self.tracer,
            name: self.name,
            channel: self.channel,
            attributes: self.attributes,
            span_id,
            parent_span_id,
            started_ns,
            on_drop,
            done: false,
        };
        (active, context)
    }

    /// Open the span on the current thread
    ///
    /// Dropping the guard finishes the span; dropping it while unwinding
    /// from a panic fails it instead.
    pub fn enter(self) -> SpanGuard {
        let (active, context) = self.start(DropOutcome::Finish);
        SpanGuard {
            active,
            _context: context.attach(),
        }
    }

    /// Run `f` inside the span, reporting its error if it returns one
    pub fn run<T, E, F>(self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: Display,
    {
        let guard = self.enter();
        match f() {
            Ok(value) => {
                guard.finish();
                Ok(value)
            }
            Err(e) => {
                guard.fail(&e);
                Err(e)
            }
        }
    }

    /// Run `future` inside the span
    ///
    /// The span stack travels with the future across threads. If the future
    /// is dropped before completing, the span fails as `cancelled`.
    pub async fn run_async<T, E, Fut>(self, future: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let (mut active, context) = self.start(DropOutcome::Cancelled);
        match context.wrap_future(future).await {
            Ok(value) => {
                active.finish();
                Ok(value)
            }
            Err(e) => {
                active.fail(short_type_name::<E>(), &e.to_string());
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropOutcome {
    Finish,
    Cancelled,
}

/// Span that has emitted `.started` and owes exactly one terminal event
struct ActiveSpan {
    tracer: Tracer,
    name: String,
    channel: String,
    attributes: Option<Fields>,
    span_id: String,
    parent_span_id: Option<String>,
    started_ns: u64,
    on_drop: DropOutcome,
    done: bool,
}

impl ActiveSpan {
    fn close(&mut self, suffix: &str, level: Level, data: impl FnOnce(u64) -> Fields) {
        if self.done {
            return;
        }
        self.done = true;

        let ended_ns = mono_ns();
        let duration_ms = elapsed_ms(self.started_ns, ended_ns);

        let mut event = self
            .tracer
            .event(format!("{}.{}", self.name, suffix), level, &self.channel)
            .span_id(self.span_id.clone())
            .parent_span_id(self.parent_span_id.clone())
            .mono_ns(ended_ns);
        if let Some(attributes) = self.attributes.clone() {
            event = event.attributes(attributes);
        }
        event.data(data(duration_ms)).emit();
    }

    fn finish(&mut self) {
        self.close("finished", Level::Info, |duration_ms| {
            fields! { "duration_ms" => duration_ms, "status" => "ok" }
        });
    }

    fn fail(&mut self, exception_type: &str, message: &str) {
        self.close("failed", Level::Error, |duration_ms| {
            fields! {
                "duration_ms" => duration_ms,
                "status" => "error",
                "exception_type" => exception_type,
                "message" => message,
            }
        });
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if std::thread::panicking() {
            self.fail("panic", "span body panicked");
            return;
        }
        match self.on_drop {
            DropOutcome::Finish => self.finish(),
            DropOutcome::Cancelled => self.fail("cancelled", "span future dropped before completion"),
        }
    }
}

/// Open span on the current thread
///
/// Not `Send`: the ambient stack it pushed belongs to this thread.
#[must_use = "dropping the guard immediately closes the span"]
pub struct SpanGuard {
    // Field order matters: the terminal event is emitted before the stack pops
    active: ActiveSpan,
    _context: ContextGuard,
}

impl SpanGuard {
    pub fn span_id(&self) -> &str {
        &self.active.span_id
    }

    pub fn parent_span_id(&self) -> Option<&str> {
        self.active.parent_span_id.as_deref()
    }

    /// Close with `.finished`
    pub fn finish(mut self) {
        self.active.finish();
    }

    /// Close with `.failed`, naming the error's type and message
    pub fn fail<E: Display + ?Sized>(mut self, error: &E) {
        self.active.fail(short_type_name::<E>(), &error.to_string());
    }

    /// Close with `.failed` using an explicit exception type
    pub fn fail_with(mut self, exception_type: &str, message: &str) {
        self.active.fail(exception_type, message);
    }
}
