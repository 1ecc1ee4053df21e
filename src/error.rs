//! Error taxonomy for the aggregation job.
//!
//! Two layers: [`StoreError`] is what the object-storage interface can fail
//! with, and [`PipelineError`] maps each pipeline stage to a run-fatal
//! failure. `EmptyInput` gets its own variant so that the expected
//! "nothing to aggregate" outcome is distinguishable from infrastructure
//! faults; callers can match on it instead of string-matching a message.

use thiserror::Error;

// ---

/// Failures surfaced by the object-storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key does not exist in the bucket.
    #[error("no such key: {0}")]
    NotFound(String),

    /// Anything else the backend reports: unreachable endpoint, denied
    /// permission, malformed response.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

// ---

/// Run-fatal pipeline failures, one variant per failing stage.
///
/// All variants abort the run; there is no retry or partial-success path.
/// The `Display` form names the stage and the object or location involved so
/// the operator can tell from the exit message where the run died.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Enumerating raw objects failed.
    #[error("listing s3://{bucket}/{prefix} failed: {source}")]
    Listing {
        bucket: String,
        prefix: String,
        #[source]
        source: StoreError,
    },

    /// The prefix matched zero raw objects (or every object was skipped by
    /// policy). Expected when a run is scheduled before any data lands.
    #[error("no input objects found under s3://{bucket}/{prefix}")]
    EmptyInput { bucket: String, prefix: String },

    /// Fetching a single raw object failed.
    #[error("fetching s3://{bucket}/{key} failed: {source}")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    /// A fetched object was not a parseable sensor reading.
    #[error("object {key} is not a valid sensor reading: {reason}")]
    Parse { key: String, reason: String },

    /// Serializing or uploading the run artifact failed.
    #[error("writing {location} failed: {source}")]
    Write {
        location: String,
        #[source]
        source: StoreError,
    },
}
