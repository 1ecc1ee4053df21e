//! S3-backed [`ObjectStore`] implementation.
//!
//! Thin mapping from the trait onto the AWS SDK: one `ListObjectsV2` call
//! per `list_page`, continuation tokens passed through opaquely, `GetObject`
//! bodies collected into memory. Credentials and region come from the
//! standard SDK environment/profile chain; `S3_ENDPOINT_URL` switches the
//! client to a custom endpoint with path-style addressing so the job can run
//! against LocalStack or MinIO.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::{ListPage, ObjectStore};
use crate::error::StoreError;

// ---

pub struct S3Store {
    // ---
    client: Client,
    max_keys: i32,
}

impl S3Store {
    /// Build a client from the ambient AWS configuration.
    ///
    /// `endpoint_url` overrides the endpoint (path-style addressing) and
    /// `max_keys` caps the page size of each listing call.
    pub async fn from_env(endpoint_url: Option<&str>, max_keys: u32) -> Self {
        // ---
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url).force_path_style(true);
        }

        S3Store {
            client: Client::from_conf(builder.build()),
            max_keys: max_keys as i32,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        // ---
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(self.max_keys)
            .set_continuation_token(continuation.map(str::to_string))
            .send()
            .await
            .map_err(|e| StoreError::Backend(anyhow::Error::new(e.into_service_error())))?;

        let keys = resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();

        // S3 only returns a usable token while the listing is truncated.
        let next = if resp.is_truncated().unwrap_or(false) {
            resp.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage { keys, next })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError> {
        // ---
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let svc = e.into_service_error();
                if svc.is_no_such_key() {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Backend(anyhow::Error::new(svc))
                }
            })?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(anyhow::Error::new(e)))?;

        Ok(body.into_bytes())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        // ---
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StoreError::Backend(anyhow::Error::new(e.into_service_error())))?;

        Ok(())
    }
}
