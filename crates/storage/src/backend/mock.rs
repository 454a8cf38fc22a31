//! In-memory storage backend for testing.

use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_key;
use crate::{StorageBackend, UploadOptions};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// An object held by [`MockBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub source: PathBuf,
    pub options: UploadOptions,
    pub data: Vec<u8>,
}

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods operate on `&self`. Uploads whose key contains one of the
/// configured failure patterns are rejected with a network error, which lets
/// tests exercise partial-failure handling.
///
/// # Examples
///
/// ```
/// use cardingest_storage::backend::MockBackend;
///
/// let backend = MockBackend::default().failing_on("3_broken");
/// ```
#[derive(Default)]
pub struct MockBackend {
    name: String,
    failures: Vec<String>,
    storage: RwLock<HashMap<PathBuf, StoredObject>>,
    folders: RwLock<BTreeSet<PathBuf>>,
}

impl MockBackend {
    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reject any upload whose key contains `pattern`.
    pub fn failing_on(mut self, pattern: impl Into<String>) -> Self {
        self.failures.push(pattern.into());
        self
    }

    /// Snapshot of a stored object.
    pub async fn get(&self, key: impl AsRef<Path>) -> Option<StoredObject> {
        let key = validate_key(key.as_ref()).ok()?;
        self.storage.read().await.get(&key).cloned()
    }

    /// Every folder marker created so far.
    pub async fn folders(&self) -> Vec<PathBuf> {
        self.folders.read().await.iter().cloned().collect()
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> Vec<PathBuf> {
        let mut keys: Vec<PathBuf> = self.storage.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        match self.name.is_empty() {
            true => "mock",
            false => &self.name,
        }
    }

    async fn upload(&self, source: &Path, key: &Path, options: &UploadOptions) -> Result<()> {
        let key = validate_key(key)?;
        let key_str = key.to_string_lossy();
        if self.failures.iter().any(|pattern| key_str.contains(pattern.as_str())) {
            exn::bail!(ErrorKind::Network(format!("injected failure for `{key_str}`")));
        }
        let data = tokio::fs::read(source).await.map_err(|e| ErrorKind::from_io(e, source))?;
        let object = StoredObject {
            source: source.to_path_buf(),
            options: options.clone(),
            data,
        };
        self.storage.write().await.insert(key, object);
        Ok(())
    }

    async fn create_folder(&self, key: &Path) -> Result<()> {
        let key = validate_key(key)?;
        self.folders.write().await.insert(key);
        Ok(())
    }

    async fn exists(&self, key: &Path) -> Result<bool> {
        let key = validate_key(key)?;
        Ok(self.storage.read().await.contains_key(&key))
    }

    async fn delete(&self, key: &Path) -> Result<()> {
        let key = validate_key(key)?;
        match self.storage.write().await.remove(&key) {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::NotFound(key)),
        }
    }
}
