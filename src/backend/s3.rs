//! S3-based storage backend.
//!
//! This module provides remote storage on AWS S3 (or compatible services),
//! so that snapshots taken on one cluster can be restored onto another.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{BackendError, Result};

use super::store::{entries_under, Backend};

/// Object key separator.
const SEPARATOR: &str = "/";

/// S3-based backend.
#[derive(Debug, Clone)]
pub struct S3Backend {
    /// S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
}

impl S3Backend {
    /// Creates a new S3 backend using the ambient AWS configuration.
    pub async fn new(bucket: &str, region: Option<&str>) -> Self {
        let config = if let Some(region_str) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Self::with_client(Client::new(&config), bucket)
    }

    /// Creates a new S3 backend with an existing client.
    #[must_use]
    pub fn with_client(client: Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    /// Normalizes an object path into an S3 key.
    fn key(path: &str) -> String {
        path.trim_matches('/').to_string()
    }
}

#[async_trait]
impl Backend for S3Backend {
    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let prefix = Self::key(path);
        debug!("Listing s3://{}/{prefix}", self.bucket);

        let mut request = self.client.list_objects_v2().bucket(&self.bucket);
        request = if prefix.is_empty() {
            request.delimiter(SEPARATOR)
        } else {
            request.prefix(&prefix)
        };

        let mut keys = Vec::new();
        let mut pages = request.into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                BackendError::unavailable(path, format!("S3 list error: {}", e.into_service_error()))
            })?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(String::from)));
        }

        Ok(entries_under(keys.iter().map(String::as_str), &prefix, SEPARATOR))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let key = Self::key(path);
        debug!("Reading s3://{}/{key}", self.bucket);

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        match result {
            Ok(response) => {
                let bytes = response.body.collect().await.map_err(|e| {
                    BackendError::unavailable(path, format!("Failed to read S3 object: {e}"))
                })?;
                Ok(bytes.to_vec())
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    Err(BackendError::not_found(path).into())
                } else {
                    Err(BackendError::unavailable(path, format!("S3 get error: {service_err}")).into())
                }
            }
        }
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let key = Self::key(path);
        debug!("Writing s3://{}/{key}", self.bucket);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| {
                BackendError::unavailable(path, format!("S3 put error: {}", e.into_service_error()))
            })?;

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let key = Self::key(path);
        debug!("Deleting s3://{}/{key}", self.bucket);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                BackendError::unavailable(path, format!("S3 delete error: {}", e.into_service_error()))
            })?;

        Ok(())
    }

    fn path_separator(&self) -> &'static str {
        SEPARATOR
    }

    fn kind(&self) -> &'static str {
        "s3"
    }
}
