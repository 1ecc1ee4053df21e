//! Persist stage: serialize the annotated table to a Parquet artifact.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DataType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::{SerializedFileWriter, SerializedRowGroupWriter};
use parquet::schema::parser::parse_message_type;
use tracing::info;

use crate::error::{PipelineError, StoreError};
use crate::models::OutputRow;
use crate::store::ObjectStore;

// ---

/// Parsed `s3://bucket/prefix` output destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    // ---
    pub bucket: String,
    pub prefix: String,
}

impl OutputLocation {
    /// Parse an output URI. The prefix may be empty and a trailing slash is
    /// dropped.
    pub fn parse(uri: &str) -> Result<Self> {
        // ---
        let rest = uri
            .strip_prefix("s3://")
            .with_context(|| format!("output must be an s3:// URI, got '{uri}'"))?;

        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix.trim_end_matches('/')),
            None => (rest, ""),
        };
        anyhow::ensure!(!bucket.is_empty(), "output URI '{uri}' has no bucket");

        Ok(OutputLocation {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }

    /// Object key for one run's artifact. The timestamp segment keeps
    /// concurrent and successive runs from colliding.
    fn run_key(&self, run_ts: DateTime<Utc>) -> String {
        // ---
        let ts = run_ts.format("%Y%m%dT%H%M%S");
        if self.prefix.is_empty() {
            format!("run_ts={ts}/aggregates.parquet")
        } else {
            format!("{}/run_ts={ts}/aggregates.parquet", self.prefix)
        }
    }
}

// ---

/// Columnar layout of the run artifact. Statistics are optional so hours
/// with no usable samples persist as nulls instead of sentinel numbers.
const OUTPUT_SCHEMA: &str = "
    message hourly_aggregates {
        required binary device_id (UTF8);
        required int64 hour (TIMESTAMP_MILLIS);
        optional double temp_avg;
        optional double temp_min;
        optional double temp_max;
        optional double hum_avg;
        required int64 count;
        required boolean anomaly;
        required binary date (UTF8);
    }
";

/// Writes the whole result set as a single Parquet file per run.
pub struct ResultWriter {
    // ---
    store: Arc<dyn ObjectStore>,
}

impl ResultWriter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Serialize `rows` and upload the artifact; returns the location written.
    pub async fn write(
        &self,
        rows: &[OutputRow],
        output: &OutputLocation,
        run_ts: DateTime<Utc>,
    ) -> Result<String, PipelineError> {
        // ---
        let key = output.run_key(run_ts);
        let location = format!("s3://{}/{}", output.bucket, key);

        let body = encode_parquet(rows).map_err(|source| PipelineError::Write {
            location: location.clone(),
            source: StoreError::Backend(source),
        })?;

        self.store
            .put(
                &output.bucket,
                &key,
                Bytes::from(body),
                "application/octet-stream",
            )
            .await
            .map_err(|source| PipelineError::Write {
                location: location.clone(),
                source,
            })?;

        info!("Wrote {} rows to {}", rows.len(), location);
        Ok(location)
    }
}

// ---

/// Encode the table as one Parquet row group in memory.
fn encode_parquet(rows: &[OutputRow]) -> Result<Vec<u8>> {
    // ---
    let schema = Arc::new(parse_message_type(OUTPUT_SCHEMA)?);
    let props = Arc::new(WriterProperties::builder().build());
    let mut writer = SerializedFileWriter::new(Vec::new(), schema, props)?;

    let mut group = writer.next_row_group()?;

    write_required::<ByteArrayType>(
        &mut group,
        rows.iter()
            .map(|r| ByteArray::from(r.device_id.as_str()))
            .collect(),
    )?;
    write_required::<Int64Type>(
        &mut group,
        rows.iter().map(|r| r.hour.timestamp_millis()).collect(),
    )?;
    write_optional_f64(&mut group, rows.iter().map(|r| r.temp_avg))?;
    write_optional_f64(&mut group, rows.iter().map(|r| r.temp_min))?;
    write_optional_f64(&mut group, rows.iter().map(|r| r.temp_max))?;
    write_optional_f64(&mut group, rows.iter().map(|r| r.hum_avg))?;
    write_required::<Int64Type>(
        &mut group,
        rows.iter().map(|r| r.count as i64).collect(),
    )?;
    write_required::<BoolType>(&mut group, rows.iter().map(|r| r.anomaly).collect())?;
    write_required::<ByteArrayType>(
        &mut group,
        rows.iter()
            .map(|r| ByteArray::from(r.hour.date_naive().to_string().as_str()))
            .collect(),
    )?;

    group.close()?;
    writer.into_inner().context("finalizing parquet buffer")
}

fn write_required<T: DataType>(
    group: &mut SerializedRowGroupWriter<'_, Vec<u8>>,
    values: Vec<T::T>,
) -> Result<()> {
    // ---
    let mut column = group
        .next_column()?
        .context("parquet schema has fewer columns than writers")?;
    column.typed::<T>().write_batch(&values, None, None)?;
    column.close()?;
    Ok(())
}

fn write_optional_f64(
    group: &mut SerializedRowGroupWriter<'_, Vec<u8>>,
    values: impl Iterator<Item = Option<f64>>,
) -> Result<()> {
    // ---
    let mut column = group
        .next_column()?
        .context("parquet schema has fewer columns than writers")?;

    let mut present = Vec::new();
    let mut def_levels = Vec::new();
    for value in values {
        match value {
            Some(v) => {
                present.push(v);
                def_levels.push(1);
            }
            None => def_levels.push(0),
        }
    }

    column
        .typed::<DoubleType>()
        .write_batch(&present, Some(&def_levels), None)?;
    column.close()?;
    Ok(())
}
