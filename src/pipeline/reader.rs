//! Fetch stage: load each raw object and parse it into a reading.

use std::sync::Arc;

use clap::ValueEnum;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::models::RawReading;
use crate::store::ObjectStore;

// ---

/// What to do when a fetched object fails to parse.
///
/// `Fail` is the default contract: the first malformed object aborts the
/// whole run, so a run either aggregates everything or nothing. `Skip` logs
/// the object and continues; use it when a poisoned prefix must still
/// produce a report.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MalformedPolicy {
    Fail,
    Skip,
}

// clap renders the default value through Display.
impl std::fmt::Display for MalformedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedPolicy::Fail => write!(f, "fail"),
            MalformedPolicy::Skip => write!(f, "skip"),
        }
    }
}

/// Fetches every discovered key and accumulates the parsed readings.
///
/// No deduplication: the same logical reading landed under two keys is
/// aggregated twice.
pub struct RecordReader {
    // ---
    store: Arc<dyn ObjectStore>,
    policy: MalformedPolicy,
}

impl RecordReader {
    pub fn new(store: Arc<dyn ObjectStore>, policy: MalformedPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn read(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<RawReading>, PipelineError> {
        // ---
        let mut records = Vec::with_capacity(keys.len());

        for key in keys {
            let body =
                self.store
                    .get(bucket, key)
                    .await
                    .map_err(|source| PipelineError::Fetch {
                        bucket: bucket.to_string(),
                        key: key.clone(),
                        source,
                    })?;

            match RawReading::from_json(&body) {
                Ok(reading) => records.push(reading),
                Err(e) => match self.policy {
                    MalformedPolicy::Fail => {
                        return Err(PipelineError::Parse {
                            key: key.clone(),
                            reason: e.to_string(),
                        });
                    }
                    MalformedPolicy::Skip => {
                        warn!("Skipping malformed object {}: {:#}", key, e);
                    }
                },
            }
        }

        debug!("Fetched {} readings from {} objects", records.len(), keys.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::MemoryStore;

    fn seeded_store() -> MemoryStore {
        // ---
        let store = MemoryStore::new();
        store.insert(
            "sensors",
            "raw/event_a.json",
            r#"{"device_id":"dev-001","temperature":20.0,"humidity":40.0,"ts":1711449900}"#,
        );
        store.insert(
            "sensors",
            "raw/event_b.json",
            r#"{"device_id":"dev-001","temperature":21.0,"humidity":42.0,"ts":1711449960}"#,
        );
        store
    }

    #[tokio::test]
    async fn reads_all_objects() {
        // ---
        let reader = RecordReader::new(Arc::new(seeded_store()), MalformedPolicy::Fail);
        let keys = vec!["raw/event_a.json".to_string(), "raw/event_b.json".to_string()];

        let records = reader.read("sensors", &keys).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].device_id, "dev-001");
    }

    #[tokio::test]
    async fn malformed_object_aborts_run_under_fail_policy() {
        // ---
        let store = seeded_store();
        store.insert("sensors", "raw/event_bad.json", "{ not json");
        let reader = RecordReader::new(Arc::new(store), MalformedPolicy::Fail);
        let keys = vec![
            "raw/event_a.json".to_string(),
            "raw/event_bad.json".to_string(),
            "raw/event_b.json".to_string(),
        ];

        let err = reader.read("sensors", &keys).await.unwrap_err();
        match err {
            PipelineError::Parse { key, .. } => assert_eq!(key, "raw/event_bad.json"),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_object_is_dropped_under_skip_policy() {
        // ---
        let store = seeded_store();
        store.insert("sensors", "raw/event_bad.json", "{ not json");
        let reader = RecordReader::new(Arc::new(store), MalformedPolicy::Skip);
        let keys = vec![
            "raw/event_a.json".to_string(),
            "raw/event_bad.json".to_string(),
            "raw/event_b.json".to_string(),
        ];

        let records = reader.read("sensors", &keys).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn missing_key_is_a_fetch_error() {
        // ---
        let reader = RecordReader::new(Arc::new(seeded_store()), MalformedPolicy::Fail);
        let keys = vec!["raw/event_gone.json".to_string()];

        let err = reader.read("sensors", &keys).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
    }
}
