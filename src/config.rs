//! Configuration for the aggregation job.
//!
//! The job surface is the command line (`--bucket`, `--prefix`, `--output`,
//! `--on-malformed`); environment variables (with optional `.env` support
//! provided by the caller) carry deployment concerns like the storage
//! endpoint and listing page size. Consolidating both here keeps `env::var`
//! calls out of the rest of the codebase and gives the run one immutable
//! configuration snapshot.

use std::env;

use anyhow::{anyhow, Result};
use clap::Parser;

use crate::pipeline::{MalformedPolicy, OutputLocation};

// ---

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Command-line surface of the aggregation job.
#[derive(Parser, Debug)]
#[command(
    name = "sensorflow-analytics",
    about = "Aggregate raw sensor readings into hourly statistics with anomaly flags"
)]
pub struct Args {
    // ---
    /// Bucket holding the raw reading objects.
    #[arg(long)]
    pub bucket: String,

    /// Key prefix to aggregate within the bucket.
    #[arg(long, default_value = "raw/")]
    pub prefix: String,

    /// Destination URI for the run artifact, e.g. s3://curated-bucket/curated.
    #[arg(long)]
    pub output: String,

    /// What to do when a fetched object fails to parse.
    #[arg(long, value_enum, default_value_t = MalformedPolicy::Fail)]
    pub on_malformed: MalformedPolicy,
}

/// Strongly typed run configuration.
///
/// All fields are immutable after loading, ensuring a consistent
/// configuration snapshot for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Bucket holding the raw reading objects.
    pub bucket: String,

    /// Key prefix to aggregate within the bucket.
    pub prefix: String,

    /// Parsed output destination.
    pub output: OutputLocation,

    /// Malformed-object policy for the fetch stage.
    pub on_malformed: MalformedPolicy,

    /// Optional storage endpoint override (LocalStack, MinIO).
    pub s3_endpoint: Option<String>,

    /// Page size for each listing call.
    pub s3_max_keys: u32,
}

/// Build the run configuration from parsed arguments plus the environment.
///
/// Optional environment variables:
/// - `S3_ENDPOINT_URL` – storage endpoint override (path-style addressing)
/// - `S3_MAX_KEYS` – listing page size (default: 1000)
///
/// Returns an error if the output URI or any variable fails to parse.
pub fn load(args: Args) -> Result<Config> {
    // ---
    let output = OutputLocation::parse(&args.output)?;
    let s3_endpoint = env::var("S3_ENDPOINT_URL").ok();
    let s3_max_keys = parse_env_u32!("S3_MAX_KEYS", 1000);

    Ok(Config {
        bucket: args.bucket,
        prefix: args.prefix,
        output,
        on_malformed: args.on_malformed,
        s3_endpoint,
        s3_max_keys,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  BUCKET       : {}", self.bucket);
        tracing::info!("  PREFIX       : {}", self.prefix);
        tracing::info!(
            "  OUTPUT       : s3://{}/{}",
            self.output.bucket,
            self.output.prefix
        );
        tracing::info!("  ON_MALFORMED : {:?}", self.on_malformed);
        tracing::info!(
            "  S3_ENDPOINT  : {}",
            self.s3_endpoint.as_deref().unwrap_or("(default)")
        );
        tracing::info!("  S3_MAX_KEYS  : {}", self.s3_max_keys);
    }
}
