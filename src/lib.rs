//! Batch analytics library for the `codemetal-sensorflow` pipeline.
//!
//! Raw sensor readings land in object storage as one JSON object per event,
//! keyed by a time/device partition scheme. This crate turns a full prefix of
//! those objects into a single per-run Parquet artifact:
//!
//! 1. Discover raw object keys (paginated listing)
//! 2. Fetch and parse each object into a [`RawReading`]
//! 3. Aggregate readings into per-device, per-hour statistics
//! 4. Flag anomalous hours per device (isolation forest, batch-relative)
//! 5. Persist the annotated table under a run-timestamped key
//!
//! Stages run strictly in sequence; any failure aborts the whole run and no
//! partial output is written. The module layout follows the Explicit Module
//! Boundary Pattern (EMBP): `store` and `pipeline` are gateways that
//! re-export their submodules' public surface.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod store;

pub use config::{Args, Config};
pub use error::{PipelineError, StoreError};
pub use models::{HourlyAggregate, OutputRow, RawReading};
