//! Data models for the aggregation job.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

// ---

/// One landed sensor reading, parsed from a raw JSON object.
///
/// `device_id` is the only structurally required field; a reading missing it
/// cannot be grouped and fails parsing. `temperature` and `humidity` may be
/// absent or null in the landed JSON and are carried as `None` so that
/// aggregation can ignore them per-statistic. `timestamp` is resolved at
/// parse time: the upstream `ts` field (epoch seconds or ISO-8601) when
/// present, UTC-now otherwise.
#[derive(Debug, Clone)]
pub struct RawReading {
    // ---
    pub device_id: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Wire form of a raw object. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct WireReading {
    // ---
    device_id: String,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(default)]
    ts: Option<WireTimestamp>,
}

/// The `ts` field as produced upstream: epoch seconds as a number, or an
/// ISO-8601 string (with or without a UTC offset).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Epoch(f64),
    Iso(String),
}

impl RawReading {
    /// Parse one raw object body into a reading.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        // ---
        let wire: WireReading = serde_json::from_slice(body).context("invalid JSON")?;

        let timestamp = match wire.ts {
            Some(WireTimestamp::Epoch(secs)) => {
                DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
                    .with_context(|| format!("epoch ts {secs} out of range"))?
            }
            Some(WireTimestamp::Iso(s)) => parse_iso_timestamp(&s)?,
            None => Utc::now(),
        };

        Ok(RawReading {
            device_id: wire.device_id,
            temperature: wire.temperature,
            humidity: wire.humidity,
            timestamp,
        })
    }
}

/// Parse an ISO-8601 timestamp, accepting both offset-carrying (RFC 3339)
/// and naive forms. Naive timestamps are taken as UTC, matching how the
/// ingestion side stamps readings.
fn parse_iso_timestamp(s: &str) -> Result<DateTime<Utc>> {
    // ---
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .with_context(|| format!("invalid ts string '{s}'"))?;
    Ok(naive.and_utc())
}

// ---

/// Per-device, per-hour summary statistics.
///
/// Unique by `(device_id, hour)`; `hour` is the UTC floor of the readings'
/// timestamps to the top of the hour. A statistic is `None` when the group
/// had no non-missing samples for it; `count` counts non-missing
/// temperatures only.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyAggregate {
    // ---
    pub device_id: String,
    pub hour: DateTime<Utc>,
    pub temp_avg: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub hum_avg: Option<f64>,
    pub count: u64,
}

/// An aggregate annotated with its anomaly flag, the unit persisted to
/// storage. The `date` column is derived by the writer from `hour`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    // ---
    pub device_id: String,
    pub hour: DateTime<Utc>,
    pub temp_avg: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub hum_avg: Option<f64>,
    pub count: u64,
    pub anomaly: bool,
}

impl OutputRow {
    pub fn from_aggregate(agg: HourlyAggregate, anomaly: bool) -> Self {
        // ---
        OutputRow {
            device_id: agg.device_id,
            hour: agg.hour,
            temp_avg: agg.temp_avg,
            temp_min: agg.temp_min,
            temp_max: agg.temp_max,
            hum_avg: agg.hum_avg,
            count: agg.count,
            anomaly,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_full_reading_with_epoch_ts() {
        // ---
        let body = br#"{"device_id":"dev-001","temperature":21.5,"humidity":44.0,"ts":1711449900}"#;
        let r = RawReading::from_json(body).unwrap();

        assert_eq!(r.device_id, "dev-001");
        assert_eq!(r.temperature, Some(21.5));
        assert_eq!(r.humidity, Some(44.0));
        assert_eq!(
            r.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 26, 10, 45, 0).unwrap()
        );
    }

    #[test]
    fn parses_iso_ts_with_offset() {
        // ---
        let body =
            br#"{"device_id":"dev-002","temperature":20.0,"humidity":40.0,"ts":"2025-03-26T10:05:00Z"}"#;
        let r = RawReading::from_json(body).unwrap();

        assert_eq!(
            r.timestamp,
            Utc.with_ymd_and_hms(2025, 3, 26, 10, 5, 0).unwrap()
        );
    }

    #[test]
    fn parses_naive_iso_ts_as_utc() {
        // ---
        let body =
            br#"{"device_id":"dev-002","temperature":20.0,"humidity":40.0,"ts":"2025-03-26T10:05:00"}"#;
        let r = RawReading::from_json(body).unwrap();

        assert_eq!(
            r.timestamp,
            Utc.with_ymd_and_hms(2025, 3, 26, 10, 5, 0).unwrap()
        );
    }

    #[test]
    fn missing_ts_defaults_to_now() {
        // ---
        let before = Utc::now();
        let body = br#"{"device_id":"dev-003","temperature":19.0,"humidity":50.0}"#;
        let r = RawReading::from_json(body).unwrap();
        let after = Utc::now();

        assert!(r.timestamp >= before && r.timestamp <= after);
    }

    #[test]
    fn missing_or_null_measurements_are_tolerated() {
        // ---
        let body = br#"{"device_id":"dev-004","humidity":null,"ts":1711449900}"#;
        let r = RawReading::from_json(body).unwrap();

        assert_eq!(r.temperature, None);
        assert_eq!(r.humidity, None);
    }

    #[test]
    fn missing_device_id_is_an_error() {
        // ---
        let body = br#"{"temperature":21.0,"humidity":40.0}"#;
        assert!(RawReading::from_json(body).is_err());
    }

    #[test]
    fn invalid_json_is_an_error() {
        // ---
        assert!(RawReading::from_json(b"not json at all").is_err());
    }

    #[test]
    fn invalid_ts_string_is_an_error() {
        // ---
        let body = br#"{"device_id":"dev-005","temperature":21.0,"humidity":40.0,"ts":"yesterday"}"#;
        assert!(RawReading::from_json(body).is_err());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        // ---
        let body = br#"{"device_id":"dev-006","temperature":21.0,"humidity":40.0,"firmware":"v2"}"#;
        let r = RawReading::from_json(body).unwrap();
        assert_eq!(r.device_id, "dev-006");
    }
}
