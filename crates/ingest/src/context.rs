use cardingest_catalog::{CatalogHandle, Category};
use cardingest_config::{Config, GroupConfig, UploadFailurePolicy};
use cardingest_storage::BackendHandle;
use std::path::PathBuf;

/// A category group: where its collection folders live below each input
/// root, and the category their cards are filed under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub category: Category,
    pub source: PathBuf,
}
impl From<&GroupConfig> for Group {
    fn from(group: &GroupConfig) -> Self {
        Self { category: Category::new(&group.tag, group.promo), source: group.source.clone() }
    }
}

/// Base URLs that card links are built from; no trailing slash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Urls {
    pub public_base: String,
    pub short_base: String,
}

/// Everything the pipeline needs, created once at startup and shared by
/// reference for the rest of the process.
pub struct Context {
    pub storage: BackendHandle,
    pub catalog: CatalogHandle,
    pub urls: Urls,
    pub groups: Vec<Group>,
    /// Maximum uploads in flight per directory; at least 1.
    pub concurrency: usize,
    pub on_upload_failure: UploadFailurePolicy,
}

impl Context {
    pub fn new(storage: BackendHandle, catalog: CatalogHandle, config: &Config) -> Self {
        Self {
            storage,
            catalog,
            urls: Urls { public_base: config.public_base(), short_base: config.short_base() },
            groups: config.ingest.groups.iter().map(Group::from).collect(),
            concurrency: config.ingest.concurrency.max(1),
            on_upload_failure: config.ingest.on_upload_failure,
        }
    }
}
