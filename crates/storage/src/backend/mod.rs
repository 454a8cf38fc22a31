//! Storage backend trait and implementations.
//!
//! This module defines the [`StorageBackend`] trait, the write-mostly
//! interface the uploader talks to, and its implementations: a local
//! directory mirror, S3-compatible services (feature `s3`) and an in-memory
//! mock (feature `mock`).

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::{MockBackend, StoredObject};
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::UploadOptions;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for object storage backends.
///
/// # Keys
/// All keys are relative to the backend's root (bucket prefix, directory) and
/// must pass [`validate_key`](crate::validate_key). Implementations enforce
/// this validation themselves so callers can't bypass it.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use cardingest_storage::{StorageBackend, UploadOptions, error::Result};
///
/// async fn push(backend: &dyn StorageBackend) -> Result<()> {
///     backend
///         .upload(
///             Path::new("/photos/twice/1_nayeon.png"),
///             Path::new("cards/girlgroups/twice/1_nayeon.jpg"),
///             &UploadOptions::public("image/jpeg"),
///         )
///         .await
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Upload the local file at `source` to `key`.
    ///
    /// Overwrites any existing object at `key`. Returns
    /// [`NotFound`](crate::error::ErrorKind::NotFound) if `source` does not
    /// exist. A single attempt is made; retrying is the caller's decision.
    async fn upload(&self, source: &Path, key: &Path, options: &UploadOptions) -> Result<()>;

    /// Create an empty "folder" marker so that `key` shows up as a directory
    /// in bucket browsers before any object has been uploaded beneath it.
    ///
    /// Idempotent.
    async fn create_folder(&self, key: &Path) -> Result<()>;

    /// Check if an object exists.
    async fn exists(&self, key: &Path) -> Result<bool>;

    /// Delete an object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist (where the backend is able to tell).
    async fn delete(&self, key: &Path) -> Result<()>;
}
