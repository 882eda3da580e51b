//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file or the
//! environment. Each target specifies its own `key_id` and `key_secret`.
//!
//! # Retries
//!
//! The SDK's retry layer is disabled: every call is a single attempt and a
//! failure is reported straight back. Re-running is the scheduler's job.

use crate::{
    ObjectInfo, StorageBackend,
    backend::ObjectInfoStream,
    error::{ErrorKind, Result},
    validate_key, validate_prefix,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::{ByteStream, DateTime},
};
use exn::ResultExt;
use std::fmt::Debug;
use std::path::Path;
use time::OffsetDateTime;

/// S3-compatible storage backend.
///
/// # Examples
///
/// ```no_run
/// use cairn_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "offsite",
///     "my-bucket",
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com"),
///     "access_key_id",
///     "secret_access_key",
/// ).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in display/logging)
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub async fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() || bucket.contains('/') {
            exn::bail!(ErrorKind::BackendError(format!("invalid bucket name: {bucket:?}")));
        }
        let credentials = Credentials::new(key_id, key_secret, None, None, "cairn-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            .retry_config(RetryConfig::disabled())
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        // Set custom endpoint for non-AWS services
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket,
        })
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string()))
    }

    fn object_info(key: &str, size: Option<i64>, modified: Option<&DateTime>) -> Result<ObjectInfo> {
        let modified = match modified {
            Some(dt) => Self::parse_datetime(dt)?,
            None => OffsetDateTime::UNIX_EPOCH,
        };
        Ok(ObjectInfo::new(key, size.unwrap_or_default().max(0) as u64, modified))
    }
}

/// Sort an SDK failure into the storage error categories.
fn classify<E, R>(err: &SdkError<E, R>, key: &str) -> ErrorKind
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: Debug,
{
    match err.code() {
        Some("NoSuchKey" | "NotFound") => ErrorKind::NotFound(key.to_string()),
        Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch") => {
            ErrorKind::PermissionDenied(key.to_string())
        },
        _ => ErrorKind::Network(DisplayErrorContext(err).to_string()),
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: &'a str) -> ObjectInfoStream<'a> {
        let prefix = match validate_prefix(prefix) {
            Ok(prefix) => prefix,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };

        Box::pin(stream! {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .into_paginator()
                .send();
            // A prefix with no objects under it is simply an empty page.
            while let Some(page) = pages.next().await {
                let page = match page {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(exn::Exn::from(classify(&err, &prefix)));
                        return;
                    },
                };
                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    yield Self::object_info(key, object.size(), object.last_modified());
                }
            }
        })
    }

    async fn upload(&self, key: &str, source: &Path) -> Result<()> {
        let key = validate_key(key)?;
        let body = ByteStream::from_path(source)
            .await
            .or_raise(|| ErrorKind::BackendError(format!("cannot read {}", source.display())))?;
        // PutObject is atomic: the object appears complete or not at all.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|err| classify(&err, &key))?;
        tracing::debug!(backend = %self.name, bucket = %self.bucket, key = %key, "Object uploaded");
        Ok(())
    }

    async fn download(&self, key: &str, target: &Path) -> Result<()> {
        let key = validate_key(key)?;
        let output = self.client.get_object().bucket(&self.bucket).key(&key).send().await.map_err(|err| {
            match err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                true => ErrorKind::NotFound(key.clone()),
                false => classify(&err, &key),
            }
        })?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        let mut file = tokio::fs::File::create(target).await.map_err(ErrorKind::Io)?;
        let mut body = output.body.into_async_read();
        tokio::io::copy(&mut body, &mut file).await.map_err(ErrorKind::Io)?;
        Ok(())
    }
}
