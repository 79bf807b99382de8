/*!
 * Local Diagnostics
 * Process-local logging for telemetry internals (sink failures, dropped batches)
 *
 * This is the fallback channel: it never feeds back into the telemetry hub.
 */

use tracing::info;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Env var switching diagnostics to JSON lines
pub const TRACE_JSON_ENV: &str = "RUNNER_TRACE_JSON";

fn json_requested() -> bool {
    std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Install the diagnostics subscriber
///
/// Environment variables:
/// - RUST_LOG: filter directives (default: info)
/// - RUNNER_TRACE_JSON: JSON output when `1` or `true`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json_requested() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = json_requested(), "telemetry diagnostics initialized");
    }
}
