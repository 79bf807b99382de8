/*!
 * Telemetry Provider
 * Trace factory owning the runner identity and the hub
 *
 * Centralizes trace creation so every run loop gets ids in the same format.
 */

use crate::config::TelemetryConfig;
use crate::core::clock::now_utc;
use crate::core::errors::TelemetryResult;
use crate::core::types::Fields;
use crate::telemetry::bootstrap::build_hub;
use crate::telemetry::hub::TelemetryHub;
use crate::telemetry::ids::{new_trace_id, sanitize_runner_id};
use crate::telemetry::tracer::Tracer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct TelemetryProvider {
    runner_id: Arc<str>,
    hub: TelemetryHub,
    trace_counter: AtomicU64,
}

impl TelemetryProvider {
    pub fn new(runner_id: &str, hub: TelemetryHub) -> Self {
        Self {
            runner_id: Arc::from(sanitize_runner_id(runner_id)),
            hub,
            trace_counter: AtomicU64::new(1),
        }
    }

    /// Validate `config`, build its sinks and wrap them in a provider
    pub fn from_config(config: &TelemetryConfig) -> TelemetryResult<Self> {
        config.validate()?;
        Ok(Self::new(&config.runner_id, build_hub(config)))
    }

    pub fn runner_id(&self) -> &str {
        &self.runner_id
    }

    pub fn hub(&self) -> &TelemetryHub {
        &self.hub
    }

    /// Begin a new trace with fresh counters
    pub fn new_trace(&self, base_attributes: Fields) -> Tracer {
        let seq = self.trace_counter.fetch_add(1, Ordering::Relaxed);
        let trace_id = new_trace_id(&self.runner_id, now_utc(), seq);
        let tracer = Tracer::new(self.hub.clone(), Arc::clone(&self.runner_id), trace_id);

        if base_attributes.is_empty() {
            tracer
        } else {
            tracer.child(base_attributes)
        }
    }

    pub fn flush(&self) {
        self.hub.flush();
    }

    pub fn close(&self) {
        self.hub.close();
    }
}
