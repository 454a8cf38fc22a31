//! In-place file name normalization.
//!
//! Every file below a collection directory is renamed so that the part before
//! the extension is lower-case with spaces replaced by underscores. The
//! extension itself is kept exactly as it was. Directories are left alone.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// A rename performed by [`normalize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rename {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Normalized form of a single file name.
///
/// Applying it twice gives the same result as applying it once.
pub fn normalized_name(name: &str) -> String {
    // A leading dot marks a hidden file, not an extension.
    let (stem, extension) = match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    };
    format!("{}{extension}", stem.to_lowercase().replace(' ', "_"))
}

/// Rename every file below `root` to its [normalized name](normalized_name).
///
/// Fails on the first rename that cannot be performed, including when the
/// normalized name is already taken by another entry in the same directory.
/// Renames performed before the failure are not undone.
#[instrument(skip_all, fields(path = %root.display()))]
pub async fn normalize(root: &Path) -> Result<Vec<Rename>> {
    let mut renames = Vec::new();
    let mut directories = vec![root.to_path_buf()];
    while let Some(directory) = directories.pop() {
        let mut files = Vec::new();
        // Every name in the directory, files and sub-directories alike, for
        // collision checks.
        let mut taken = HashSet::new();
        let mut entries = fs::read_dir(&directory).await.or_raise(|| ErrorKind::Discovery(directory.clone()))?;
        while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Discovery(directory.clone()))? {
            let file_type = entry.file_type().await.or_raise(|| ErrorKind::Discovery(entry.path()))?;
            taken.insert(entry.file_name());
            if file_type.is_dir() {
                directories.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.file_name());
            }
        }
        files.sort();

        for file in files {
            let Some(name) = file.to_str() else {
                tracing::warn!(path = %directory.join(&file).display(), "file name is not valid UTF-8; leaving as is");
                continue;
            };
            let normalized = normalized_name(name);
            if normalized == name {
                continue;
            }
            let from = directory.join(&file);
            let to = directory.join(&normalized);
            if !taken.insert(normalized.into()) {
                exn::bail!(ErrorKind::Normalize(from));
            }
            fs::rename(&from, &to).await.or_raise(|| ErrorKind::Normalize(from.clone()))?;
            taken.remove(&file);
            tracing::debug!(from = %from.display(), to = %to.display(), "renamed file");
            renames.push(Rename { from, to });
        }
    }
    Ok(renames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("1_abc.jpg", "1_abc.jpg")]
    #[case("1_Red Velvet.PNG", "1_red_velvet.PNG")]
    #[case("2_IU  Solo.jpeg", "2_iu__solo.jpeg")]
    #[case("3_A.B C.Gif", "3_a.b_c.Gif")]
    #[case("NoExtension Here", "noextension_here")]
    #[case(".Hidden File", ".hidden_file")]
    fn test_normalized_name(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(normalized_name(name), expected);
        assert_eq!(normalized_name(&normalized_name(name)), expected);
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[tokio::test]
    async fn test_normalize_recurses_and_keeps_directories() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("1_Nayeon Im.PNG"));
        touch(&dir.path().join("Sub Dir/2_Momo.jpg"));
        touch(&dir.path().join("3_sana.jpg"));

        let renames = normalize(dir.path()).await.unwrap();
        assert_eq!(renames.len(), 2);
        assert!(dir.path().join("1_nayeon_im.PNG").is_file());
        assert!(dir.path().join("Sub Dir/2_momo.jpg").is_file());
        assert!(dir.path().join("3_sana.jpg").is_file());
    }

    #[tokio::test]
    async fn test_normalize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("1_A B.jpg"));
        assert_eq!(normalize(dir.path()).await.unwrap().len(), 1);
        assert!(normalize(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_normalize_collision_fails() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("1_a_b.jpg"));
        touch(&dir.path().join("1_A B.jpg"));
        let err = normalize(dir.path()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Normalize(path) if path.ends_with("1_A B.jpg")));
        assert!(dir.path().join("1_A B.jpg").is_file());
    }

    #[tokio::test]
    async fn test_normalize_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = normalize(&dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Discovery(_)));
    }
}
