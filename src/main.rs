/*!
 * Runner - Main Entry Point
 *
 * Demo runner process:
 * - Loads telemetry config (file from RUNNER_TELEMETRY_CONFIG, then env)
 * - Builds the hub and trace provider
 * - Runs one traced cycle with nested and concurrent spans
 * - Flushes and closes every sink on the way out
 */

use runner_telemetry::{
    fields, init_tracing, Level, SpanContext, TelemetryConfig, TelemetryError, TelemetryProvider, Tracer,
};
use std::time::Duration;
use tracing::{info, warn};

const CONFIG_PATH_ENV: &str = "RUNNER_TELEMETRY_CONFIG";

const SYMBOLS: &[&str] = &["EURUSD", "GBPUSD", "USDJPY"];

fn load_config() -> Result<TelemetryConfig, TelemetryError> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => TelemetryConfig::from_file(path.trim())?,
        _ => TelemetryConfig::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

async fn score_symbol(tracer: Tracer, symbol: &'static str) -> Result<f64, TelemetryError> {
    let scoped = tracer.child(fields! { "symbol" => symbol });
    scoped
        .span("model.score", "ops", Level::Info)
        .with_attributes(fields! { "model" => "mean_reversion" })
        .run_async(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let score = (symbol.len() as f64) / 10.0;
            scoped.emit_with("model.scored", Level::Debug, "debug", || {
                fields! { "score" => score, "side" => if score > 0.5 { "buy" } else { "sell" } }
            });
            Ok(score)
        })
        .await
}

async fn run_cycle(tracer: &Tracer) -> Result<(), TelemetryError> {
    let pipeline = tracer.child(fields! { "component" => "pipeline" });

    let universe = pipeline.span("pipeline.universe", "ops", Level::Info).run(|| {
        pipeline.emit(
            "pipeline.universe_loaded",
            Level::Info,
            "ops",
            None,
            Some(fields! { "symbols_count" => SYMBOLS.len() }),
        );
        Ok::<_, TelemetryError>(SYMBOLS.to_vec())
    })?;

    let stage = pipeline
        .span("pipeline.stage", "ops", Level::Info)
        .with_attributes(fields! { "stage" => "model" });
    stage
        .run_async(async {
            let tasks: Vec<_> = universe
                .into_iter()
                .map(|symbol| {
                    let context = SpanContext::current();
                    tokio::spawn(context.wrap_future(score_symbol(pipeline.clone(), symbol)))
                })
                .collect();

            let mut passed = 0usize;
            for task in tasks {
                match task.await {
                    Ok(Ok(score)) if score >= 0.5 => passed += 1,
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "scoring failed"),
                    Err(e) => warn!(error = %e, "scoring task aborted"),
                }
            }

            pipeline.emit(
                "pipeline.stage_summary",
                Level::Info,
                "audit",
                None,
                Some(fields! { "passed_count" => passed, "threshold" => 0.5 }),
            );
            Ok::<_, TelemetryError>(())
        })
        .await
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();

    let config = load_config()?;
    let provider = TelemetryProvider::from_config(&config)?;
    info!(runner_id = provider.runner_id(), "runner starting");

    let tracer = provider.new_trace(fields! { "runmode" => "demo" });
    tracer.emit("runner.cycle_started", Level::Info, "audit", None, None);

    let outcome = run_cycle(&tracer).await;
    if let Err(e) = &outcome {
        warn!(error = %e, "cycle failed");
    }

    tracer.emit(
        "runner.cycle_finished",
        Level::Info,
        "audit",
        None,
        Some(fields! { "status" => if outcome.is_ok() { "ok" } else { "error" } }),
    );
    info!(trace_id = tracer.trace_id(), events = tracer.events_emitted(), "cycle complete");

    provider.close();
    outcome?;
    Ok(())
}
