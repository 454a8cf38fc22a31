//! Object storage boundary for card image uploads.
//!
//! The ingestion pipeline only ever pushes local files to a destination key,
//! so the [`StorageBackend`] trait is narrow: upload, create a folder marker,
//! check for existence, delete. Backends are constructed once at startup and shared as a
//! [`BackendHandle`] for the lifetime of the process.

pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::models::{UploadOptions, Visibility};
pub use crate::path::validate as validate_key;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
