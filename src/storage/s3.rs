//! S3 artifact store: upload, then hand out a presigned GET link.
//!
//! Credentials and endpoint come from the default AWS provider chain
//! (environment, shared profile, SSO, container or instance role), so
//! `AWS_ACCESS_KEY_ID`, `AWS_PROFILE` and `AWS_ENDPOINT_URL` all apply.
//! Objects are addressed path-style so S3-compatible endpoints such as
//! MinIO work unchanged.

use super::{Artifact, ArtifactKey, ArtifactStore};
use crate::config::StorageConfig;
use crate::error::{ArtifactStoreError, ProcessingError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Region, presigning::PresigningConfig, primitives::ByteStream, Client};
use std::time::Duration;
use tracing::debug;

pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
    prefix: String,
    expiry: Duration,
}

impl S3ArtifactStore {
    /// Build a client from the storage settings and the default AWS
    /// configuration chain.
    ///
    /// # Errors
    /// [`ProcessingError::InvalidConfig`] when bucket name or key is missing.
    pub async fn from_config(storage: &StorageConfig) -> Result<Self, ProcessingError> {
        let bucket = storage
            .s3_bucket_name
            .clone()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| ProcessingError::InvalidConfig("S3 bucket name is required".into()))?;
        let prefix = storage
            .s3_bucket_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProcessingError::InvalidConfig("S3 bucket key is required".into()))?;

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(storage.aws_region_name.clone()))
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self::with_client(
            Client::from_conf(s3_config),
            bucket,
            &prefix,
            Duration::from_secs(storage.presigned_url_expiry_secs),
        ))
    }

    fn with_client(client: Client, bucket: String, prefix: &str, expiry: Duration) -> Self {
        Self {
            client,
            bucket,
            prefix: prefix.trim_end_matches('/').to_string(),
            expiry,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key: `{bucket_key}/{run}/{file name}`.
    fn object_key(&self, key: &ArtifactKey) -> String {
        format!("{}/{}", self.prefix, key.object_name())
    }

    async fn presign(&self, object_key: &str) -> Result<String, ArtifactStoreError> {
        let presign_err = |detail: String| ArtifactStoreError::Presign {
            key: object_key.to_string(),
            detail,
        };

        let config = PresigningConfig::expires_in(self.expiry).map_err(|e| presign_err(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key)
            .presigned(config)
            .await
            .map_err(|e| presign_err(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(&self, key: &ArtifactKey, artifact: Artifact) -> Result<String, ArtifactStoreError> {
        let object_key = self.object_key(key);
        let size = artifact.bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .content_type(artifact.content_type)
            .body(ByteStream::from(artifact.bytes))
            .send()
            .await
            .map_err(|e| ArtifactStoreError::S3 {
                key: object_key.clone(),
                detail: e.to_string(),
            })?;

        debug!("Uploaded s3://{}/{} ({} bytes)", self.bucket, object_key, size);
        self.presign(&object_key).await
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}
