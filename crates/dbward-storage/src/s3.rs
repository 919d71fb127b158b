//! S3-compatible object storage.
//!
//! Objects smaller than one part go up in a single `PutObject`; larger
//! streams switch to a multipart upload that is aborted if any part fails.
//! Without explicit keys the ambient AWS credential chain is used.

use crate::config::{non_blank, parse_config};
use crate::handle::{BoxedReader, StorageHandle, normalize_path};
use crate::provider::StorageFactory;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use dbward_core::{SecretString, StorageError, StorageResult, VolumeDescriptor, VolumeKind};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Part size for multipart uploads, also the single-put threshold
pub const PART_SIZE: usize = 8 * 1024 * 1024;

const KIND: VolumeKind = VolumeKind::S3;

#[derive(Debug, Clone, Deserialize)]
struct S3Config {
    bucket: String,
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    access_key_id: Option<String>,
    #[serde(default)]
    secret_access_key: Option<SecretString>,
    /// Custom endpoint for S3-compatible services
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    use_path_style: bool,
}

fn backend_error(e: impl std::error::Error) -> StorageError {
    StorageError::backend(KIND, DisplayErrorContext(e))
}

/// Fill `buf` from `reader`, stopping early only at EOF
async fn read_part(reader: &mut (dyn AsyncRead + Send + Unpin), buf: &mut Vec<u8>) -> std::io::Result<usize> {
    buf.clear();
    let mut limited = reader.take(PART_SIZE as u64);
    limited.read_to_end(buf).await
}

/// A bucket plus key prefix
#[derive(Debug, Clone)]
pub struct S3Volume {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Volume {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    fn key(&self, path: &str) -> StorageResult<String> {
        let normalized = normalize_path(path)?;
        Ok(if self.prefix.is_empty() {
            normalized
        } else {
            format!("{}/{}", self.prefix, normalized)
        })
    }

    async fn put_single(&self, key: &str, body: Vec<u8>) -> StorageResult<u64> {
        let size = body.len() as u64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(backend_error)?;
        Ok(size)
    }

    async fn put_multipart(
        &self,
        key: &str,
        first_part: Vec<u8>,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::backend(KIND, "no upload id returned"))?
            .to_string();

        match self.upload_parts(key, &upload_id, first_part, reader).await {
            Ok((parts, total)) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(backend_error)?;
                Ok(total)
            }
            Err(e) => {
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        key,
                        error = %DisplayErrorContext(abort),
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        first_part: Vec<u8>,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<(Vec<CompletedPart>, u64)> {
        let mut parts = Vec::new();
        let mut total = 0u64;
        let mut part_number = 1;
        let mut buf = first_part;

        loop {
            total += buf.len() as u64;
            tracing::debug!(key, part_number, bytes = buf.len(), "Uploading part");
            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(std::mem::take(&mut buf)))
                .send()
                .await
                .map_err(backend_error)?;
            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .build(),
            );

            if read_part(reader, &mut buf).await? == 0 {
                break;
            }
            part_number += 1;
        }

        Ok((parts, total))
    }
}

#[async_trait]
impl StorageHandle for S3Volume {
    fn kind(&self) -> VolumeKind {
        KIND
    }

    async fn write_stream(&self, path: &str, mut reader: BoxedReader) -> StorageResult<u64> {
        let key = self.key(path)?;
        let mut first = Vec::with_capacity(PART_SIZE);
        let n = read_part(&mut reader, &mut first).await?;

        let written = if n < PART_SIZE {
            self.put_single(&key, first).await?
        } else {
            self.put_multipart(&key, first, &mut reader).await?
        };
        tracing::debug!(bucket = %self.bucket, key = %key, bytes = written, "Uploaded object");
        Ok(written)
    }

    async fn read_stream(&self, path: &str) -> StorageResult<BoxedReader> {
        let key = self.key(path)?;
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => Ok(Box::pin(output.body.into_async_read())),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                Err(StorageError::NotFound { path: key })
            }
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let key = self.key(path)?;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let key = self.key(path)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

/// Opens [`S3Volume`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct S3Factory;

#[async_trait]
impl StorageFactory for S3Factory {
    fn kind(&self) -> VolumeKind {
        KIND
    }

    async fn open(&self, volume: &VolumeDescriptor) -> StorageResult<Arc<dyn StorageHandle>> {
        let config: S3Config = parse_config(volume)?;
        if config.bucket.trim().is_empty() {
            return Err(StorageError::invalid_config(KIND, "bucket cannot be empty"));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = non_blank(&config.region) {
            loader = loader.region(Region::new(region.to_string()));
        }
        match (non_blank(&config.access_key_id), &config.secret_access_key) {
            (Some(id), Some(secret)) if !secret.is_empty() => {
                loader = loader.credentials_provider(Credentials::new(
                    id,
                    secret.expose(),
                    None,
                    None,
                    "dbward-volume",
                ));
            }
            (Some(_), _) | (None, Some(_)) => {
                return Err(StorageError::invalid_config(
                    KIND,
                    "access_key_id and secret_access_key must be set together",
                ));
            }
            (None, None) => {
                tracing::debug!(volume = %volume.name, "Using ambient AWS credential chain");
            }
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = non_blank(&config.endpoint) {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(config.use_path_style);

        Ok(Arc::new(S3Volume::new(
            Client::from_conf(builder.build()),
            config.bucket,
            config.prefix,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_bucket_is_config_error() {
        let volume = VolumeDescriptor::new(KIND, "s3").with_config("region", "eu-west-1");
        assert!(matches!(
            S3Factory.open(&volume).await,
            Err(StorageError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_half_credentials_rejected() {
        let volume = VolumeDescriptor::new(KIND, "s3")
            .with_config("bucket", "backups")
            .with_config("access_key_id", "AKIA123");
        let err = S3Factory.open(&volume).await.err().unwrap();
        assert!(err.to_string().contains("must be set together"));
    }

    #[tokio::test]
    async fn test_key_prefixing() {
        let volume = VolumeDescriptor::new(KIND, "s3")
            .with_config("bucket", "backups")
            .with_config("region", "us-east-1")
            .with_config("access_key_id", "AKIA123")
            .with_config("secret_access_key", "s3cr3t")
            .with_config("endpoint", "http://127.0.0.1:9000")
            .with_config("use_path_style", true);
        let config: S3Config = parse_config(&volume).unwrap();
        let shared = aws_config::SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        let client = Client::from_conf(aws_sdk_s3::config::Builder::from(&shared).build());

        let prefixed = S3Volume::new(client.clone(), config.bucket.clone(), "/nightly/");
        assert_eq!(prefixed.key("app/a.gz").unwrap(), "nightly/app/a.gz");

        let bare = S3Volume::new(client, config.bucket, "");
        assert_eq!(bare.key("/a.gz").unwrap(), "a.gz");
        assert!(bare.key("../a.gz").is_err());
    }

    #[tokio::test]
    async fn test_read_part_caps_at_part_size() {
        let data = vec![7u8; PART_SIZE + 10];
        let mut reader: &[u8] = &data;
        let mut buf = Vec::new();
        assert_eq!(read_part(&mut reader, &mut buf).await.unwrap(), PART_SIZE);
        assert_eq!(read_part(&mut reader, &mut buf).await.unwrap(), 10);
        assert_eq!(read_part(&mut reader, &mut buf).await.unwrap(), 0);
    }
}
