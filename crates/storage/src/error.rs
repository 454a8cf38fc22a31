//! Storage Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Backend-specific failures (SDK errors, I/O errors) are
//! attached as children of the [`ErrorKind`] raised here.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Source file (or stored object) does not exist
    #[display("not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied (permissions or credentials)
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Network-related error (S3 connections, etc.)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Key contains invalid characters or escapes the storage root
    #[display("invalid key: {}", _0.display())]
    InvalidKey(#[error(not(source))] PathBuf),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::BackendError(_))
    }

    pub(crate) fn from_io(err: IoError, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind as IoErrorKind;
    use std::path::Path;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Network("timed out".to_string()).is_retryable());
        assert!(ErrorKind::BackendError("throttled".to_string()).is_retryable());
        assert!(ErrorKind::from_io(IoError::from(IoErrorKind::Interrupted), Path::new("a")).is_retryable());
        assert!(!ErrorKind::from_io(IoError::from(IoErrorKind::NotFound), Path::new("a")).is_retryable());
        assert!(!ErrorKind::from_io(IoError::from(IoErrorKind::PermissionDenied), Path::new("a")).is_retryable());
        assert!(!ErrorKind::InvalidKey("../escape".into()).is_retryable());
    }
}
