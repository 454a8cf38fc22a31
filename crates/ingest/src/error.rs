//! Ingestion Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Failures raised by the storage and catalog crates are
//! attached as children of the [`ErrorKind`] raised here, so the full chain
//! is available when a directory failure is logged with `{:?}`.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An ingestion error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an ingestion failure.
///
/// ### Directory-fatal
/// - [`ErrorKind::Upload`]
/// - [`ErrorKind::Catalog`]
/// - [`ErrorKind::Level`]
/// - [`ErrorKind::Normalize`]
///
/// ### Batch-fatal
/// - [`ErrorKind::Discovery`]
/// - [`ErrorKind::Report`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// At least one file could not be pushed to object storage.
    #[display("upload failed: {_0}")]
    Upload(#[error(not(source))] String),
    /// A collection or card could not be persisted.
    #[display("catalog update failed")]
    Catalog,
    /// A card level has more digits than the catalog can store.
    #[display("card level {_0} is too large to store")]
    Level(#[error(not(source))] String),
    /// A file could not be renamed into its normalized form.
    #[display("could not normalize {}", _0.display())]
    Normalize(#[error(not(source))] PathBuf),
    /// A directory could not be listed.
    #[display("could not list {}", _0.display())]
    Discovery(#[error(not(source))] PathBuf),
    /// The report file could not be written.
    #[display("could not write report {}", _0.display())]
    Report(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Numeric tag of the error, as written to logs and reports.
    ///
    /// Upload failures are `1` and catalog failures `2`; everything else is
    /// a local filesystem problem and tagged `0`.
    pub fn code(&self) -> u8 {
        match self {
            Self::Upload(_) => 1,
            Self::Catalog | Self::Level(_) => 2,
            Self::Normalize(_) | Self::Discovery(_) | Self::Report(_) => 0,
        }
    }
}
