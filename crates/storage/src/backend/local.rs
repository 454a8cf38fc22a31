//! Local filesystem storage backend.
//!
//! Mirrors the bucket layout into a directory on disk. Useful for dry runs
//! against a real input tree, and for serving the images from a plain web
//! server instead of an object store. Content type and visibility have no
//! filesystem equivalent and are only logged.

use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_key;
use crate::{StorageBackend, UploadOptions};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use cardingest_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/srv/cards")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    /// Directory standing in for the bucket
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend, creating `root` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root));
            }
        } else {
            // Only happens once at startup; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| ErrorKind::from_io(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Absolute destination for a key.
    fn absolute_path(&self, key: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, source: &Path, key: &Path, options: &UploadOptions) -> Result<()> {
        let destination = self.absolute_path(key)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(|e| ErrorKind::from_io(e, parent))?;
        }
        fs::copy(source, &destination).await.map_err(|e| ErrorKind::from_io(e, source))?;
        tracing::debug!(
            backend = %self.name,
            key = %key.display(),
            content_type = %options.content_type,
            visibility = %options.visibility,
            "Copied file into local bucket"
        );
        Ok(())
    }

    async fn create_folder(&self, key: &Path) -> Result<()> {
        let path = self.absolute_path(key)?;
        fs::create_dir_all(&path).await.map_err(|e| ErrorKind::from_io(e, key))?;
        Ok(())
    }

    async fn exists(&self, key: &Path) -> Result<bool> {
        let path = self.absolute_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => exn::bail!(ErrorKind::from_io(e, &path)),
        }
    }

    async fn delete(&self, key: &Path) -> Result<()> {
        let path = self.absolute_path(key)?;
        fs::remove_file(&path).await.map_err(|e| ErrorKind::from_io(e, key))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TempDir, LocalBackend) {
        let source = TempDir::new().unwrap();
        let bucket = TempDir::new().unwrap();
        let backend = LocalBackend::new("test", bucket.path()).unwrap();
        (source, bucket, backend)
    }

    #[test]
    fn test_relative_root_rejected() {
        assert!(LocalBackend::new("test", "relative/path").is_err());
    }

    #[tokio::test]
    async fn test_upload_creates_parents() {
        let (source, bucket, backend) = setup();
        let file = source.path().join("1_nayeon.png");
        std::fs::write(&file, b"png bytes").unwrap();
        let key = Path::new("cards/girlgroups/twice/1_nayeon.jpg");
        backend.upload(&file, key, &UploadOptions::public("image/jpeg")).await.unwrap();
        assert!(backend.exists(key).await.unwrap());
        let stored = std::fs::read(bucket.path().join(key)).unwrap();
        assert_eq!(stored, b"png bytes");
    }

    #[tokio::test]
    async fn test_upload_missing_source() {
        let (source, _bucket, backend) = setup();
        let missing = source.path().join("nope.jpg");
        let result = backend.upload(&missing, Path::new("a/b.jpg"), &UploadOptions::public("image/jpeg")).await;
        let err = result.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upload_rejects_traversal() {
        let (source, _bucket, backend) = setup();
        let file = source.path().join("1_a.jpg");
        std::fs::write(&file, b"x").unwrap();
        let result = backend.upload(&file, Path::new("../escape.jpg"), &UploadOptions::public("image/jpeg")).await;
        assert!(matches!(&*result.unwrap_err(), ErrorKind::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_create_folder_is_idempotent() {
        let (_source, bucket, backend) = setup();
        let key = Path::new("cards/girlgroups/twice");
        backend.create_folder(key).await.unwrap();
        backend.create_folder(key).await.unwrap();
        assert!(bucket.path().join(key).is_dir());
        // A folder marker is not an object.
        assert!(!backend.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let (source, _bucket, backend) = setup();
        let file = source.path().join("1_a.jpg");
        std::fs::write(&file, b"x").unwrap();
        let key = Path::new("cards/x/1_a.jpg");
        backend.upload(&file, key, &UploadOptions::public("image/jpeg")).await.unwrap();
        backend.delete(key).await.unwrap();
        assert!(!backend.exists(key).await.unwrap());
        assert!(backend.delete(key).await.is_err());
    }
}
