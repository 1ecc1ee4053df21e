//! Discovery stage: enumerate raw object keys under a prefix.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::PipelineError;
use crate::store::ObjectStore;

// ---

/// Lists every `.json` key under a prefix, following continuation tokens
/// until the backend reports exhaustion. Key order is whatever the listing
/// yields; nothing downstream depends on it.
pub struct ObjectLister {
    // ---
    store: Arc<dyn ObjectStore>,
}

impl ObjectLister {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, PipelineError> {
        // ---
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            page_count += 1;

            let page = self
                .store
                .list_page(bucket, prefix, continuation.as_deref())
                .await
                .map_err(|source| PipelineError::Listing {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                    source,
                })?;

            debug!(
                "Listing page {} returned {} keys under s3://{}/{}",
                page_count,
                page.keys.len(),
                bucket,
                prefix
            );

            keys.extend(page.keys.into_iter().filter(|k| k.ends_with(".json")));

            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        info!(
            "Discovered {} raw objects under s3://{}/{} ({} pages)",
            keys.len(),
            bucket,
            prefix,
            page_count
        );
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashSet;

    #[tokio::test]
    async fn follows_pagination_to_exhaustion() {
        // ---
        let store = MemoryStore::with_page_size(1000);
        for i in 0..2500 {
            store.insert("sensors", &format!("raw/event_{i:05}.json"), "{}");
        }

        let lister = ObjectLister::new(Arc::new(store));
        let keys = lister.list("sensors", "raw/").await.unwrap();

        assert_eq!(keys.len(), 2500, "no key may be dropped across pages");
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), 2500, "no key may be duplicated across pages");
    }

    #[tokio::test]
    async fn ignores_non_json_keys() {
        // ---
        let store = MemoryStore::new();
        store.insert("sensors", "raw/event_1.json", "{}");
        store.insert("sensors", "raw/_manifest.txt", "x");
        store.insert("sensors", "raw/event_2.json.bak", "x");

        let lister = ObjectLister::new(Arc::new(store));
        let keys = lister.list("sensors", "raw/").await.unwrap();

        assert_eq!(keys, vec!["raw/event_1.json"]);
    }

    #[tokio::test]
    async fn empty_prefix_lists_no_keys() {
        // ---
        let store = MemoryStore::new();
        store.insert("sensors", "other/event_1.json", "{}");

        let lister = ObjectLister::new(Arc::new(store));
        let keys = lister.list("sensors", "raw/").await.unwrap();

        assert!(keys.is_empty());
    }
}
