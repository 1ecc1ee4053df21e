//! Detection stage: flag anomalous hours per device.
//!
//! A pure function of the aggregate table and fixed hyperparameters. Each
//! device's rows are scored against a forest fit on that same device's batch
//! in this run, so a row's flag is batch-relative: adding or removing rows
//! can change which hours of the same device are flagged. That is the
//! contract, not an accident; no model survives the run.

use tracing::{debug, warn};

use super::forest::{ForestParams, IsolationForest};
use crate::models::{HourlyAggregate, OutputRow};

// ---

/// Devices contributing fewer aggregate rows than this are never flagged;
/// there is too little history for density estimation.
const MIN_ROWS_FOR_FIT: usize = 10;

/// Attach anomaly flags to the aggregate table.
///
/// Expects input sorted by `(device_id, hour)` as produced by aggregation;
/// rows of one device must be contiguous. Output preserves order.
pub fn detect(aggregates: Vec<HourlyAggregate>, params: &ForestParams) -> Vec<OutputRow> {
    // ---
    let mut out = Vec::with_capacity(aggregates.len());
    let mut rest = aggregates.as_slice();

    while let Some(first) = rest.first() {
        let len = rest
            .iter()
            .take_while(|a| a.device_id == first.device_id)
            .count();
        let (device_rows, remainder) = rest.split_at(len);

        let flags = flag_device(device_rows, params);
        for (agg, anomaly) in device_rows.iter().zip(flags) {
            out.push(OutputRow::from_aggregate(agg.clone(), anomaly));
        }

        rest = remainder;
    }

    out
}

/// Flag one device's rows.
///
/// Rows missing either feature are excluded from the fit and never flagged.
/// Degenerate batches (too few usable rows, or every feature vector
/// identical) fall back to no anomalies rather than failing the run.
fn flag_device(rows: &[HourlyAggregate], params: &ForestParams) -> Vec<bool> {
    // ---
    let mut flags = vec![false; rows.len()];

    if rows.len() < MIN_ROWS_FOR_FIT {
        debug!(
            "Device {}: {} rows < {}, skipping fit",
            rows[0].device_id,
            rows.len(),
            MIN_ROWS_FOR_FIT
        );
        return flags;
    }

    let mut features = Vec::with_capacity(rows.len());
    let mut row_index = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if let (Some(t), Some(h)) = (row.temp_avg, row.hum_avg) {
            features.push([t, h]);
            row_index.push(i);
        }
    }

    if features.len() < 2 || features.iter().all(|p| *p == features[0]) {
        warn!(
            "Device {}: degenerate feature matrix ({} usable rows), flagging no anomalies",
            rows[0].device_id,
            features.len()
        );
        return flags;
    }

    let forest = IsolationForest::fit(&features, params);
    let scores: Vec<f64> = features.iter().map(|p| forest.score(p)).collect();

    for i in top_outliers(&scores, params.contamination) {
        flags[row_index[i]] = true;
    }
    flags
}

/// Indices of the most isolated points: the top `max(1, floor(n * fraction))`
/// by score, ties broken by input order.
fn top_outliers(scores: &[f64], fraction: f64) -> Vec<usize> {
    // ---
    let k = ((scores.len() as f64 * fraction).floor() as usize).max(1);

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(k);
    order
}
