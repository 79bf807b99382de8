/*!
 * Memory Sink
 * Keeps accepted events in process so tests can assert on exact sequences
 */

use super::{Sink, SinkFilter};
use crate::core::errors::TelemetryResult;
use crate::telemetry::events::{Event, Level};
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct MemorySink {
    filter: SinkFilter,
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new(filter: SinkFilter) -> Self {
        Self {
            filter,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn filter(&self) -> &SinkFilter {
        &self.filter
    }

    /// Snapshot of everything received so far, in arrival order
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Drain everything received so far
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Event names in arrival order
    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn enabled(&self, channel: &str, level: Level, _name: Option<&str>) -> bool {
        self.filter.accepts(channel, level)
    }

    fn emit(&self, event: &Event) -> TelemetryResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
