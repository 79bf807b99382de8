/*!
 * Telemetry Hub
 * Fan-out router from tracers to sinks
 *
 * The sink list is shared by every child hub and swapped RCU-style, so the
 * emission path reads it without taking a lock. Each sink is isolated: an
 * error or panic in one never suppresses delivery to the others.
 */

use crate::core::types::Fields;
use crate::telemetry::events::{Event, Level};
use crate::telemetry::sinks::Sink;
use arc_swap::ArcSwap;
use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

type SinkList = Vec<Arc<dyn Sink>>;

/// Fan-out hub holding the configured sinks and hub-level base attributes
#[derive(Clone)]
pub struct TelemetryHub {
    sinks: Arc<ArcSwap<SinkList>>,
    base_attributes: Arc<Fields>,
}

impl TelemetryHub {
    /// Hub with no sinks; every `enabled` query answers false
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    pub fn with_sinks(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            sinks: Arc::new(ArcSwap::from_pointee(sinks)),
            base_attributes: Arc::new(Fields::new()),
        }
    }

    /// Register a sink; visible to this hub and every hub sharing its list
    pub fn add_sink(&self, sink: Arc<dyn Sink>) {
        self.sinks.rcu(|current| {
            let mut next = SinkList::clone(current);
            next.push(Arc::clone(&sink));
            next
        });
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.load().len()
    }

    pub fn base_attributes(&self) -> &Fields {
        &self.base_attributes
    }

    /// Deliver an event to every sink that accepts it
    pub fn emit(&self, event: &Event) {
        let merged: Cow<'_, Event> = if self.base_attributes.is_empty() {
            Cow::Borrowed(event)
        } else {
            Cow::Owned(event.with_base_attributes(&self.base_attributes))
        };

        let sinks = self.sinks.load_full();
        for sink in sinks.iter() {
            let delivered = catch_unwind(AssertUnwindSafe(|| {
                if !sink.enabled(&merged.channel, merged.level, Some(&merged.name)) {
                    return Ok(());
                }
                sink.emit(&merged)
            }));

            match delivered {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(sink = sink.name(), event = %merged.name, error = %e, "telemetry sink emit failed");
                }
                Err(_) => {
                    warn!(sink = sink.name(), event = %merged.name, "telemetry sink panicked during emit");
                }
            }
        }
    }

    /// True iff at least one sink would accept this channel / level
    pub fn enabled(&self, channel: &str, level: Level) -> bool {
        let sinks = self.sinks.load();
        sinks.iter().any(|sink| {
            catch_unwind(AssertUnwindSafe(|| sink.enabled(channel, level, None))).unwrap_or(false)
        })
    }

    /// Hub sharing the same sinks with additional base attributes
    pub fn child(&self, attributes: Fields) -> TelemetryHub {
        let mut merged = Fields::clone(&self.base_attributes);
        merged.extend(attributes);

        TelemetryHub {
            sinks: Arc::clone(&self.sinks),
            base_attributes: Arc::new(merged),
        }
    }

    /// Best-effort flush of every sink
    pub fn flush(&self) {
        self.for_each_sink("flush", |sink| sink.flush());
    }

    /// Best-effort close of every sink
    pub fn close(&self) {
        self.for_each_sink("close", |sink| sink.close());
    }

    fn for_each_sink<F>(&self, op: &'static str, f: F)
    where
        F: Fn(&dyn Sink) -> crate::core::errors::TelemetryResult<()>,
    {
        let sinks = self.sinks.load_full();
        for sink in sinks.iter() {
            match catch_unwind(AssertUnwindSafe(|| f(sink.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(sink = sink.name(), op, error = %e, "telemetry sink operation failed"),
                Err(_) => warn!(sink = sink.name(), op, "telemetry sink panicked"),
            }
        }
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TelemetryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryHub")
            .field("sinks", &self.sink_count())
            .field("base_attributes", &self.base_attributes)
            .finish()
    }
}
