//! Narrow object-storage interface used by the pipeline.
//!
//! The pipeline only ever needs three primitives: paginated listing, whole
//! object fetch, and whole-object upload. [`ObjectStore`] captures exactly
//! those, and every pipeline component receives a store explicitly at
//! construction so tests can substitute [`MemoryStore`] for the real
//! [`S3Store`]. This module is the gateway (EMBP): submodules stay private
//! and their public surface is re-exported here.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

mod memory;
mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

// ---

/// One page of a paginated listing.
///
/// `next` is the opaque continuation token to pass back for the following
/// page, or `None` once the listing is exhausted.
#[derive(Debug, Default)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next: Option<String>,
}

/// Read-mostly object storage: list, get, and one terminal put per run.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of keys under `prefix`, resuming from `continuation`.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, StoreError>;

    /// Fetch an object's full body.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError>;

    /// Upload an object, replacing any existing body under `key`.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError>;
}
