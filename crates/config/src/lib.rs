//! Layered configuration for the ingestion pipeline.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults ([`Config::default()`]).
//! 2. A TOML file: `$CARDINGEST_CONFIG` if set, otherwise `config.toml` in the
//!    platform configuration directory. A missing default file is skipped; a
//!    missing file named by the environment is an error.
//! 3. Environment variables prefixed `CARDINGEST_`, nested keys separated by
//!    `__` (e.g. `CARDINGEST_INGEST__CONCURRENCY=4`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

pub const ENV_PREFIX: &str = "CARDINGEST_";
/// Environment variable naming the configuration file.
pub const CONFIG_FILE_ENV: &str = "CARDINGEST_CONFIG";
pub const DEFAULT_CONCURRENCY: usize = 16;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "cardingest")
}

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
    pub fn expose(&self) -> &str {
        &self.0
    }
}
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Copy objects into a directory on the local filesystem.
    Local { root: PathBuf },
    /// Any S3-compatible object store.
    S3 {
        bucket: String,
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
        key_id: Secret,
        key_secret: Secret,
    },
}
impl Default for StorageConfig {
    fn default() -> Self {
        let root = project_dirs().map(|dirs| dirs.data_dir().join("objects")).unwrap_or_else(|| "objects".into());
        Self::Local { root }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlConfig {
    /// Base of every card's `url`; derived from the storage settings if unset.
    #[serde(default)]
    pub public_base: Option<String>,
    /// Base of every card's `short_url`; falls back to the public base.
    #[serde(default)]
    pub short_base: Option<String>,
}

/// What happens to a directory when one of its uploads fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum UploadFailurePolicy {
    /// Stop uploading, write nothing to the catalog, fail the directory.
    #[default]
    #[display("abort_directory")]
    AbortDirectory,
    /// Report the failed file and catalogue everything else.
    #[display("skip_file")]
    SkipFile,
}

/// A category group: which sub-directory of each input root holds collection
/// folders, and how cards found there are tagged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub tag: String,
    #[serde(default)]
    pub promo: bool,
    /// Relative to each input root.
    pub source: PathBuf,
}
impl GroupConfig {
    pub fn new(tag: impl Into<String>, promo: bool, source: impl Into<PathBuf>) -> Self {
        Self { tag: tag.into(), promo, source: source.into() }
    }
}

fn default_groups() -> Vec<GroupConfig> {
    vec![
        GroupConfig::new("girlgroups", false, "girlgroups"),
        GroupConfig::new("boygroups", false, "boygroups"),
        GroupConfig::new("girlgroups", true, "promo/girlgroups"),
        GroupConfig::new("boygroups", true, "promo/boygroups"),
    ]
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum number of uploads in flight for one directory.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub on_upload_failure: UploadFailurePolicy,
    #[serde(default = "default_groups")]
    pub groups: Vec<GroupConfig>,
}
impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            on_upload_failure: UploadFailurePolicy::default(),
            groups: default_groups(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub urls: UrlConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Also write log output to this file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load from the default sources (see the crate documentation).
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_FILE_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.is_file() {
                    exn::bail!(ErrorKind::Invalid(format!(
                        "{CONFIG_FILE_ENV} names a missing file: {}",
                        path.display()
                    )));
                }
                Self::load_from(Some(&path))
            },
            None => {
                let default = project_dirs().map(|dirs| dirs.config_dir().join("config.toml"));
                Self::load_from(default.as_deref())
            },
        }
    }

    /// Load with an explicit (optional) configuration file.
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(file).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(file = ?file, "loaded configuration");
        Ok(config)
    }

    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file_exact(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]))
    }

    pub fn validate(&self) -> Result<()> {
        match &self.storage {
            StorageConfig::Local { root } if !root.is_absolute() => {
                exn::bail!(ErrorKind::Invalid(format!("local storage root must be absolute: {}", root.display())));
            },
            StorageConfig::S3 { bucket, region, .. } if bucket.is_empty() || region.is_empty() => {
                exn::bail!(ErrorKind::Invalid("s3 storage needs a bucket and a region".to_string()));
            },
            _ => {},
        }
        if self.ingest.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("ingest.concurrency must be at least 1".to_string()));
        }
        if self.ingest.groups.is_empty() {
            exn::bail!(ErrorKind::Invalid("ingest.groups must not be empty".to_string()));
        }
        for group in &self.ingest.groups {
            if group.tag.is_empty() || group.tag.contains(['/', '\\']) || group.tag.starts_with('.') {
                exn::bail!(ErrorKind::Invalid(format!("group tag is not a valid key segment: {:?}", group.tag)));
            }
            let escapes = group.source.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if group.source.as_os_str().is_empty() || escapes {
                exn::bail!(ErrorKind::Invalid(format!(
                    "group source must be a relative path inside the input root: {}",
                    group.source.display()
                )));
            }
        }
        Ok(())
    }

    /// Base URL that storage keys are appended to.
    pub fn public_base(&self) -> String {
        if let Some(base) = &self.urls.public_base {
            return base.trim_end_matches('/').to_string();
        }
        let base = match &self.storage {
            StorageConfig::Local { root } => format!("file://{}", root.display()),
            StorageConfig::S3 { bucket, region, endpoint, prefix, .. } => {
                let mut base = match endpoint {
                    Some(endpoint) => format!("{}/{bucket}", endpoint.trim_end_matches('/')),
                    None => format!("https://{bucket}.s3.{region}.amazonaws.com"),
                };
                if let Some(prefix) = prefix.as_deref().map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
                    base.push('/');
                    base.push_str(prefix);
                }
                base
            },
        };
        base.trim_end_matches('/').to_string()
    }

    /// Base URL for the short per-collection links.
    pub fn short_base(&self) -> String {
        match &self.urls.short_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => self.public_base(),
        }
    }
}
