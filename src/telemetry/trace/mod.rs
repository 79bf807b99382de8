/*!
 * Trace
 * Per-trace shared counters and the ambient span stack
 */

mod context;
mod state;

pub use context::{ContextGuard, SpanContext, WithSpanContext};
pub use state::TraceState;
