//! S3-compatible storage backend.
//!
//! Card images are pushed with `PutObject`, streaming the body straight from
//! the local file. Works with AWS S3 and S3-compatible services such as
//! DigitalOcean Spaces, Backblaze B2 or MinIO.
//!
//! # Credentials
//!
//! Credentials are passed in explicitly by the caller, which reads them from
//! the configuration layers (file or `CARDINGEST_` environment variables).

use crate::error::{ErrorKind, Result};
use crate::path::key_string;
use crate::{StorageBackend, UploadOptions, Visibility};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use exn::ResultExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Upper bound on concurrent S3 requests issued by one backend, regardless of
/// how many upload tasks the caller runs.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible storage backend.
///
/// Stores objects in a bucket, optionally under a key prefix. All keys are
/// relative to the configured prefix (if any).
///
/// # Examples
///
/// ```no_run
/// use cardingest_storage::backend::S3Backend;
///
/// let backend = S3Backend::new(
///     "spaces",
///     "my-bucket",
///     None,
///     "nyc3",
///     Some("https://nyc3.digitaloceanspaces.com"),
///     "access_key_id",
///     "secret_access_key",
/// );
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region (e.g. "nyc3")
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        let prefix = prefix.map(|p| p.trim_matches('/').to_string()).filter(|p| !p.is_empty());
        let credentials = Credentials::new(key_id, key_secret, None, None, "cardingest-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // Path-style addressing for compatibility with S3-compatible
            // services (Spaces, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        }
    }

    /// Construct the full S3 key from a relative key.
    fn full_key(&self, key: &Path) -> Result<String> {
        let key = key_string(key)?;
        Ok(join_prefix(self.prefix.as_deref(), &key))
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }

    fn canned_acl(visibility: Visibility) -> ObjectCannedAcl {
        match visibility {
            Visibility::Public => ObjectCannedAcl::PublicRead,
            Visibility::Private => ObjectCannedAcl::Private,
        }
    }
}

fn join_prefix(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
        None => key.to_string(),
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, source: &Path, key: &Path, options: &UploadOptions) -> Result<()> {
        let full_key = self.full_key(key)?;
        let body = ByteStream::from_path(source)
            .await
            .or_raise(|| ErrorKind::NotFound(source.to_path_buf()))?;
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(body)
            .content_type(&options.content_type)
            .acl(Self::canned_acl(options.visibility))
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("PutObject failed for `{full_key}`")))?;
        tracing::debug!(backend = %self.name, bucket = %self.bucket, key = %full_key, "Uploaded object");
        Ok(())
    }

    async fn create_folder(&self, key: &Path) -> Result<()> {
        // S3 has no directories; an empty object whose key ends in a slash is
        // what bucket browsers render as one.
        let marker = format!("{}/", self.full_key(key)?);
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&marker)
            .body(ByteStream::from_static(&[]))
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("PutObject failed for `{marker}`")))?;
        tracing::debug!(backend = %self.name, bucket = %self.bucket, key = %marker, "Created folder marker");
        Ok(())
    }

    async fn exists(&self, key: &Path) -> Result<bool> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await?;
        match self.client.head_object().bucket(&self.bucket).key(&full_key).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(err).or_raise(|| ErrorKind::Network(format!("HeadObject failed for `{full_key}`"))),
        }
    }

    async fn delete(&self, key: &Path) -> Result<()> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("DeleteObject failed for `{full_key}`")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_prefix_without_prefix() {
        assert_eq!(join_prefix(None, "cards/girlgroups/twice/1_nayeon.jpg"), "cards/girlgroups/twice/1_nayeon.jpg");
    }

    #[test]
    fn test_join_prefix_with_trailing_slash() {
        assert_eq!(join_prefix(Some("assets/"), "cards/x/1_a.jpg"), "assets/cards/x/1_a.jpg");
    }

    #[test]
    fn test_full_key_uses_prefix() {
        let backend =
            S3Backend::new("test", "bucket", Some("/assets/".to_string()), "nyc3", None::<String>, "id", "secret");
        assert_eq!(backend.full_key(Path::new("cards/x/./1_a.jpg")).unwrap(), "assets/cards/x/1_a.jpg");
        assert!(backend.full_key(Path::new("../1_a.jpg")).is_err());
    }

    #[test]
    fn test_canned_acl() {
        assert_eq!(S3Backend::canned_acl(Visibility::Public), ObjectCannedAcl::PublicRead);
        assert_eq!(S3Backend::canned_acl(Visibility::Private), ObjectCannedAcl::Private);
    }
}
