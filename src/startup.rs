//! Constructs the process-wide handles from configuration.

use crate::cli::Command;
use crate::error::{ErrorKind, Result};
use cardingest_catalog::{CatalogHandle, Database, JsonCatalog, SqliteCatalog};
use cardingest_config::StorageConfig;
use cardingest_storage::BackendHandle;
use cardingest_storage::backend::{LocalBackend, S3Backend};
use exn::ResultExt;
use std::sync::Arc;

/// Object storage backend described by the configuration.
pub(crate) fn storage(config: &StorageConfig) -> Result<BackendHandle> {
    let backend: BackendHandle = match config {
        StorageConfig::Local { root } => Arc::new(LocalBackend::new("local", root).or_raise(|| ErrorKind::Storage)?),
        StorageConfig::S3 { bucket, region, endpoint, prefix, key_id, key_secret } => Arc::new(S3Backend::new(
            "s3",
            bucket,
            prefix.clone(),
            region,
            endpoint.clone(),
            key_id.expose(),
            key_secret.expose(),
        )),
    };
    tracing::info!(backend = backend.name(), "storage backend ready");
    Ok(backend)
}

/// The opened catalog, plus the database pool when there is one so that it
/// can be closed once the batch is over.
pub(crate) struct OpenCatalog {
    pub handle: CatalogHandle,
    pub database: Option<Database>,
}

pub(crate) async fn catalog(command: &Command) -> Result<OpenCatalog> {
    let catalog = match command {
        Command::Db { database, .. } => {
            let database = Database::connect(database).await.or_raise(|| ErrorKind::Catalog)?;
            let handle: CatalogHandle = Arc::new(SqliteCatalog::from(&database));
            OpenCatalog { handle, database: Some(database) }
        },
        Command::Json { cards, collections, .. } => {
            let handle: CatalogHandle =
                Arc::new(JsonCatalog::open(cards, collections).await.or_raise(|| ErrorKind::Catalog)?);
            OpenCatalog { handle, database: None }
        },
    };
    tracing::info!(catalog = catalog.handle.name(), "catalog ready");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_local_storage() {
        let dir = TempDir::new().unwrap();
        let backend = storage(&StorageConfig::Local { root: dir.path().join("objects") }).unwrap();
        assert_eq!(backend.name(), "local");
        assert!(dir.path().join("objects").is_dir());
    }

    #[test]
    fn test_relative_local_storage_fails() {
        let err = storage(&StorageConfig::Local { root: "objects".into() }).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Storage));
    }

    #[tokio::test]
    async fn test_json_catalog() {
        let dir = TempDir::new().unwrap();
        let command = Command::Json {
            cards: dir.path().join("cards.json"),
            collections: dir.path().join("collections.json"),
            report: dir.path().join("report.txt"),
            roots: vec![PathBuf::from("/in")],
        };
        let catalog = catalog(&command).await.unwrap();
        assert!(catalog.database.is_none());
        assert!(catalog.handle.list_cards(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_catalog() {
        let dir = TempDir::new().unwrap();
        let command = Command::Db {
            database: dir.path().join("catalog.db"),
            report: dir.path().join("report.txt"),
            roots: vec![PathBuf::from("/in")],
        };
        let catalog = catalog(&command).await.unwrap();
        assert_eq!(catalog.handle.next_card_id().await.unwrap(), 0);
        catalog.database.unwrap().close().await;
        assert!(dir.path().join("catalog.db").is_file());
    }
}
