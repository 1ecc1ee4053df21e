//! Aggregation stage: group readings by device and UTC hour.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{HourlyAggregate, RawReading};

// ---

/// Floor a timestamp to the start of its UTC hour.
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    // ---
    let secs = ts.timestamp().div_euclid(3600) * 3600;
    // Flooring moves toward the epoch, so the result is always representable.
    DateTime::from_timestamp(secs, 0).unwrap_or(ts)
}

#[derive(Default)]
struct Accum {
    // ---
    temp_sum: f64,
    temp_count: u64,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    hum_sum: f64,
    hum_count: u64,
}

impl Accum {
    fn push(&mut self, reading: &RawReading) {
        // ---
        if let Some(t) = reading.temperature {
            self.temp_sum += t;
            self.temp_count += 1;
            self.temp_min = Some(self.temp_min.map_or(t, |m| m.min(t)));
            self.temp_max = Some(self.temp_max.map_or(t, |m| m.max(t)));
        }
        if let Some(h) = reading.humidity {
            self.hum_sum += h;
            self.hum_count += 1;
        }
    }
}

/// Compute per-device, per-hour summary statistics.
///
/// Each statistic ignores missing inputs independently; `count` is the
/// number of non-missing temperatures in the group. A group whose every
/// temperature is missing is kept with `None` statistics rather than being
/// dropped, so downstream stages see the hour existed. Output is sorted by
/// `(device_id, hour)`.
pub fn aggregate(records: &[RawReading]) -> Vec<HourlyAggregate> {
    // ---
    let mut groups: BTreeMap<(String, DateTime<Utc>), Accum> = BTreeMap::new();

    for reading in records {
        let hour = floor_to_hour(reading.timestamp);
        groups
            .entry((reading.device_id.clone(), hour))
            .or_default()
            .push(reading);
    }

    groups
        .into_iter()
        .map(|((device_id, hour), acc)| HourlyAggregate {
            device_id,
            hour,
            temp_avg: (acc.temp_count > 0).then(|| acc.temp_sum / acc.temp_count as f64),
            temp_min: acc.temp_min,
            temp_max: acc.temp_max,
            hum_avg: (acc.hum_count > 0).then(|| acc.hum_sum / acc.hum_count as f64),
            count: acc.temp_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn reading(
        device_id: &str,
        ts: DateTime<Utc>,
        temperature: Option<f64>,
        humidity: Option<f64>,
    ) -> RawReading {
        // ---
        RawReading {
            device_id: device_id.to_string(),
            temperature,
            humidity,
            timestamp: ts,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 26, h, m, s).unwrap()
    }

    #[test]
    fn floors_to_start_of_hour() {
        // ---
        assert_eq!(floor_to_hour(at(10, 5, 33)), at(10, 0, 0));
        assert_eq!(floor_to_hour(at(10, 0, 0)), at(10, 0, 0));
        assert_eq!(floor_to_hour(at(10, 59, 59)), at(10, 0, 0));
    }

    #[test]
    fn three_readings_in_one_hour_collapse_to_one_row() {
        // ---
        let records = vec![
            reading("dev-001", at(10, 5, 0), Some(20.0), Some(40.0)),
            reading("dev-001", at(10, 20, 0), Some(21.0), Some(42.0)),
            reading("dev-001", at(10, 55, 0), Some(22.0), Some(41.0)),
        ];

        let rows = aggregate(&records);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.device_id, "dev-001");
        assert_eq!(row.hour, at(10, 0, 0));
        assert_eq!(row.temp_avg, Some(21.0));
        assert_eq!(row.temp_min, Some(20.0));
        assert_eq!(row.temp_max, Some(22.0));
        assert!((row.hum_avg.unwrap() - 41.0).abs() < 1e-9);
        assert_eq!(row.count, 3);
    }

    #[test]
    fn groups_split_by_device_and_hour() {
        // ---
        let records = vec![
            reading("dev-001", at(10, 5, 0), Some(20.0), Some(40.0)),
            reading("dev-001", at(11, 5, 0), Some(21.0), Some(41.0)),
            reading("dev-002", at(10, 10, 0), Some(25.0), Some(45.0)),
        ];

        let rows = aggregate(&records);
        assert_eq!(rows.len(), 3);

        // Every reading lands in exactly one group.
        let total: u64 = rows.iter().map(|r| r.count).sum();
        assert_eq!(total, records.len() as u64);

        // Sorted by (device_id, hour).
        let keys: Vec<_> = rows.iter().map(|r| (r.device_id.clone(), r.hour)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn statistics_ignore_missing_values_independently() {
        // ---
        let records = vec![
            reading("dev-001", at(10, 5, 0), Some(20.0), None),
            reading("dev-001", at(10, 10, 0), None, Some(40.0)),
        ];

        let rows = aggregate(&records);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.temp_avg, Some(20.0));
        assert_eq!(row.temp_min, Some(20.0));
        assert_eq!(row.temp_max, Some(20.0));
        assert_eq!(row.hum_avg, Some(40.0));
        assert_eq!(row.count, 1, "count only counts non-missing temperatures");
    }

    #[test]
    fn group_with_no_temperatures_is_kept_with_no_data_markers() {
        // ---
        let records = vec![
            reading("dev-001", at(10, 5, 0), None, Some(40.0)),
            reading("dev-001", at(10, 6, 0), None, None),
        ];

        let rows = aggregate(&records);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.temp_avg, None);
        assert_eq!(row.temp_min, None);
        assert_eq!(row.temp_max, None);
        assert_eq!(row.hum_avg, Some(40.0));
        assert_eq!(row.count, 0);
    }

    #[test]
    fn readings_straddling_the_hour_boundary_split() {
        // ---
        let records = vec![
            reading("dev-001", at(10, 59, 59), Some(20.0), Some(40.0)),
            reading("dev-001", at(11, 0, 0), Some(30.0), Some(50.0)),
        ];

        let rows = aggregate(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].hour, at(10, 0, 0));
        assert_eq!(rows[1].hour, at(11, 0, 0));
    }
}
