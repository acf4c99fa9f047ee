//! AWS S3 storage implementation.
//!
//! Works against any S3-compatible endpoint. Cloudflare R2 buckets are used
//! by pointing `S3_ENDPOINT_URL` at the account endpoint.
//!
//! Keys are stored under `{bucket}/{prefix}/{key}`; an empty prefix stores
//! them at the bucket root.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

/// S3-based blob storage.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create S3 storage from environment configuration.
    ///
    /// - `S3_BUCKET`: bucket name (default: `seatwatch-state`)
    /// - `S3_PREFIX`: key prefix (default: none)
    /// - `S3_ENDPOINT_URL`: custom endpoint, enables path-style addressing
    pub async fn from_env() -> Result<Self> {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);

        if let Ok(endpoint) = std::env::var("S3_ENDPOINT_URL") {
            log::info!("Using S3-compatible endpoint {}", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "seatwatch-state".to_string());
        let prefix = std::env::var("S3_PREFIX").unwrap_or_default();

        Ok(Self::new(client, bucket, prefix))
    }

    /// Full object key for a store key.
    fn object_key(&self, key: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}/{key}")
        }
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let object_key = self.object_key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::storage(key, e))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                // Check if it's a "not found" error
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::debug!("No object at {}", self.location(key));
                    Ok(None)
                } else {
                    Err(AppError::s3(format!(
                        "get {}: {}",
                        self.location(key),
                        service_err
                    )))
                }
            }
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let len = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::s3(format!("put {}: {}", self.location(key), e)))?;

        log::debug!("Wrote {} bytes to {}", len, self.location(key));
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.object_key(key))
    }
}
