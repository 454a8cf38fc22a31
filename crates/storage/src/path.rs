//! Object key validation.
//!
//! Keys are expressed as relative [`Path`]s so that backends which mirror the
//! bucket onto a filesystem and backends which talk to S3 share the same
//! rules: no escaping the root, no NUL bytes, never empty.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates an object key for security and correctness.
///
/// # Returns
/// Returns the normalized key if valid, or
/// [`InvalidKey`](crate::error::ErrorKind::InvalidKey) if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use cardingest_storage::validate_key;
/// assert!(validate_key("cards/girlgroups/twice/1_nayeon.jpg").is_ok());
/// assert!(validate_key("../outside.jpg").is_err());
/// assert_eq!(
///     validate_key("cards//girlgroups/./twice/1_nayeon.jpg").unwrap(),
///     Path::new("cards/girlgroups/twice/1_nayeon.jpg")
/// );
/// ```
pub fn validate(key: impl AsRef<Path>) -> Result<PathBuf> {
    let key = key.as_ref();
    let mut components = Vec::new();
    for component in key.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidKey(key.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidKey(key.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// Render a validated key with forward slashes, as object stores expect.
#[cfg(feature = "s3")]
pub(crate) fn key_string(key: &Path) -> Result<String> {
    let validated = validate(key)?;
    let mut parts = Vec::new();
    for component in validated.components() {
        let Some(part) = component.as_os_str().to_str() else {
            exn::bail!(ErrorKind::InvalidKey(key.to_path_buf()));
        };
        parts.push(part);
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert_eq!(
            validate("cards/girlgroups/twice/1_nayeon.jpg").unwrap(),
            Path::new("cards/girlgroups/twice/1_nayeon.jpg")
        );
        assert_eq!(validate("promo/boygroups/bts/2_jin.gif").unwrap(), Path::new("promo/boygroups/bts/2_jin.gif"));
    }

    #[test]
    fn test_normalization() {
        assert_eq!(validate("a//b//c.jpg").unwrap(), Path::new("a/b/c.jpg"));
        assert_eq!(validate("a/./b/c.jpg").unwrap(), Path::new("a/b/c.jpg"));
        assert_eq!(validate("/a/b.jpg").unwrap(), Path::new("a/b.jpg"));
        assert_eq!(validate("a/b/../c.jpg").unwrap(), Path::new("a/c.jpg"));
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
    }

    #[test]
    fn test_invalid_keys() {
        assert!(validate("a\0b").is_err());
        assert!(validate("").is_err());
        assert!(validate("./").is_err());
        assert!(validate("//").is_err());
    }

    #[cfg(feature = "s3")]
    #[test]
    fn test_key_string() {
        assert_eq!(key_string(Path::new("cards/x/./y.jpg")).unwrap(), "cards/x/y.jpg");
    }
}
