//! In-memory [`ObjectStore`] used by tests.
//!
//! Keys are held in sorted order and listings paginate with a configurable
//! page size, mirroring the continuation-token behavior of a real backend.
//! The continuation token is the last key of the previous page; the next
//! page resumes strictly after it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{ListPage, ObjectStore};
use crate::error::StoreError;

// ---

pub struct MemoryStore {
    // ---
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Bytes>>>,
    page_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        // ---
        MemoryStore {
            buckets: Mutex::new(BTreeMap::new()),
            page_size,
        }
    }

    /// Seed an object without going through the async trait.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        // ---
        self.buckets
            .lock()
            .expect("memory store lock poisoned")
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body.into());
    }

    /// All keys currently held under `bucket`, in sorted order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        // ---
        self.buckets
            .lock()
            .expect("memory store lock poisoned")
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        // ---
        let buckets = self.buckets.lock().expect("memory store lock poisoned");
        let Some(objects) = buckets.get(bucket) else {
            return Ok(ListPage::default());
        };

        let mut keys: Vec<String> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| continuation.is_none_or(|token| k.as_str() > token))
            .take(self.page_size + 1)
            .cloned()
            .collect();

        let next = if keys.len() > self.page_size {
            keys.truncate(self.page_size);
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListPage { keys, next })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError> {
        // ---
        self.buckets
            .lock()
            .expect("memory store lock poisoned")
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        // ---
        self.insert(bucket, key, body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn paginates_in_sorted_order() {
        // ---
        let store = MemoryStore::with_page_size(2);
        for i in 0..5 {
            store.insert("b", &format!("raw/k{i}.json"), "{}");
        }

        let page1 = tokio_test::block_on(store.list_page("b", "raw/", None)).unwrap();
        assert_eq!(page1.keys, vec!["raw/k0.json", "raw/k1.json"]);
        let token = page1.next.unwrap();

        let page2 = tokio_test::block_on(store.list_page("b", "raw/", Some(&token))).unwrap();
        assert_eq!(page2.keys, vec!["raw/k2.json", "raw/k3.json"]);

        let page3 =
            tokio_test::block_on(store.list_page("b", "raw/", page2.next.as_deref())).unwrap();
        assert_eq!(page3.keys, vec!["raw/k4.json"]);
        assert!(page3.next.is_none());
    }

    #[test]
    fn exact_page_boundary_ends_cleanly() {
        // ---
        let store = MemoryStore::with_page_size(2);
        store.insert("b", "raw/a.json", "{}");
        store.insert("b", "raw/b.json", "{}");

        let page = tokio_test::block_on(store.list_page("b", "raw/", None)).unwrap();
        assert_eq!(page.keys.len(), 2);
        assert!(page.next.is_none());
    }

    #[test]
    fn get_missing_key_is_not_found() {
        // ---
        let store = MemoryStore::new();
        let err = tokio_test::block_on(store.get("b", "nope")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn unknown_bucket_lists_empty() {
        // ---
        let store = MemoryStore::new();
        let page = tokio_test::block_on(store.list_page("ghost", "raw/", None)).unwrap();
        assert!(page.keys.is_empty());
        assert!(page.next.is_none());
    }
}
