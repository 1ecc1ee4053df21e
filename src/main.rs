//! Application entry point for the `codemetal-sensorflow-analytics` job.
//!
//! This binary orchestrates one batch aggregation run:
//! - Loading configuration from the command line and environment (`.env` honored)
//! - Initializing structured logging/tracing
//! - Building the S3 client from the ambient AWS configuration
//! - Executing the five pipeline stages (discover, fetch, aggregate, detect, persist)
//! - Printing the location of the artifact written
//!
//! # Environment Variables
//! - `S3_ENDPOINT_URL` (optional) – storage endpoint override for LocalStack/MinIO
//! - `S3_MAX_KEYS` (optional) – listing page size (default: 1000)
//! - `ANALYTICS_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `ANALYTICS_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! A run that finds no input exits non-zero with a message naming the prefix;
//! any other failure exits non-zero with a message identifying the failing
//! stage. No artifact exists for a run that did not complete all stages.

use std::{env, io::IsTerminal, sync::Arc};

use clap::Parser;
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use sensorflow_analytics::config::{self, Args};
use sensorflow_analytics::pipeline;
use sensorflow_analytics::store::S3Store;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let args = Args::parse();
    let cfg = config::load(args)?;
    cfg.log_config();

    let store = Arc::new(S3Store::from_env(cfg.s3_endpoint.as_deref(), cfg.s3_max_keys).await);

    let location = pipeline::run(store, &cfg).await?;
    println!("Wrote: {location}");

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `ANALYTICS_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `ANALYTICS_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("ANALYTICS_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to ANALYTICS_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("ANALYTICS_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},aws_config=warn,aws_smithy_runtime=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
