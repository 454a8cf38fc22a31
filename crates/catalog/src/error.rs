//! Catalog Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Both catalog backends raise the same [`ErrorKind`]s so
//! the ingestion pipeline never needs to know which one it is talking to.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// Reading or rewriting a JSON catalog file failed.
    #[display("catalog file error: {}", _0.display())]
    File(#[error(not(source))] PathBuf),
    /// A card referenced a collection that has not been created.
    #[display("unknown collection: {_0}")]
    UnknownCollection(#[error(not(source))] String),
    /// Serialization/deserialization error.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}
