//! The batch aggregation-and-anomaly pipeline.
//!
//! Five stages run strictly in sequence, each consuming the full output of
//! the one before:
//!
//! > Discover → Fetch → Aggregate → Detect → Persist
//!
//! [`run`] is the single entry point; any stage failure aborts the run and
//! nothing is persisted. This module is the gateway (EMBP): stage modules
//! stay private and their public surface is re-exported here.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::PipelineError;
use crate::store::ObjectStore;

mod aggregate;
mod detect;
mod forest;
mod lister;
mod reader;
mod writer;

pub use aggregate::{aggregate, floor_to_hour};
pub use detect::detect;
pub use forest::{ForestParams, IsolationForest};
pub use lister::ObjectLister;
pub use reader::{MalformedPolicy, RecordReader};
pub use writer::{OutputLocation, ResultWriter};

// ---

/// Execute one full run and return the location of the artifact written.
///
/// Returns [`PipelineError::EmptyInput`] when the prefix matches no raw
/// objects (or the skip policy discarded every object); callers can treat
/// that outcome separately from infrastructure faults.
pub async fn run(store: Arc<dyn ObjectStore>, cfg: &Config) -> Result<String, PipelineError> {
    // ---
    info!("Starting aggregation run for s3://{}/{}", cfg.bucket, cfg.prefix);

    // Step 1: Discover
    debug!("Run step 1: discover raw objects");

    let lister = ObjectLister::new(store.clone());
    let keys = lister.list(&cfg.bucket, &cfg.prefix).await?;
    if keys.is_empty() {
        return Err(PipelineError::EmptyInput {
            bucket: cfg.bucket.clone(),
            prefix: cfg.prefix.clone(),
        });
    }

    // Step 2: Fetch
    debug!("Run step 2: fetch and parse {} objects", keys.len());

    let reader = RecordReader::new(store.clone(), cfg.on_malformed);
    let records = reader.read(&cfg.bucket, &keys).await?;
    if records.is_empty() {
        return Err(PipelineError::EmptyInput {
            bucket: cfg.bucket.clone(),
            prefix: cfg.prefix.clone(),
        });
    }

    // Step 3: Aggregate
    debug!("Run step 3: aggregate {} readings", records.len());

    let aggregates = aggregate(&records);
    info!(
        "Aggregated {} readings into {} device-hour rows",
        records.len(),
        aggregates.len()
    );

    // Step 4: Detect
    debug!("Run step 4: score {} rows", aggregates.len());

    let rows = detect(aggregates, &ForestParams::default());
    let flagged = rows.iter().filter(|r| r.anomaly).count();
    info!("Flagged {} of {} rows as anomalous", flagged, rows.len());

    // Step 5: Persist
    debug!("Run step 5: persist run artifact");

    let writer = ResultWriter::new(store);
    writer.write(&rows, &cfg.output, Utc::now()).await
}
