//! Concurrent upload of a collection directory to object storage.
//!
//! Every file below the directory becomes one upload task. Tasks run at most
//! [`Context::concurrency`] at a time and never raise: each one resolves to
//! an [`UploadOutcome`], and the [`UploadFailurePolicy`] decides what a
//! failed task means for the rest of the directory.

use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::validate::{CardName, validate};
use cardingest_catalog::Category;
use cardingest_config::UploadFailurePolicy;
use cardingest_storage::{BackendHandle, UploadOptions};
use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::instrument;

const STILL_EXTENSION: &str = "jpg";
const STILL_CONTENT_TYPE: &str = "image/jpeg";
const ANIMATED_CONTENT_TYPE: &str = "image/gif";

/// Storage key of the folder holding a collection's cards.
pub fn collection_key(category: &Category, collection: &str) -> String {
    match category.promo {
        true => format!("promo/{}/{collection}", category.tag),
        false => format!("cards/{}/{collection}", category.tag),
    }
}

/// File name a card is stored under: animated images keep their extension,
/// everything else is filed as a JPEG.
pub fn canonical_file_name(relative: &str, card: &CardName) -> String {
    let extension = match card.is_animated() {
        true => card.extension.as_str(),
        false => STILL_EXTENSION,
    };
    Path::new(relative).with_extension(extension).to_string_lossy().into_owned()
}

fn content_type(card: &CardName) -> &'static str {
    match card.is_animated() {
        true => ANIMATED_CONTENT_TYPE,
        false => STILL_CONTENT_TYPE,
    }
}

/// A file that made it into object storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    /// Path relative to the collection directory, as found on disk.
    pub relative: String,
    /// Name the file was stored under, see [`canonical_file_name`].
    pub file_name: String,
    pub key: String,
    pub card: CardName,
}

/// A file that could not be pushed to object storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedUpload {
    pub relative: String,
    pub reason: String,
    /// The storage error was transient, so running the batch again may
    /// succeed for this file.
    pub retryable: bool,
}
impl fmt::Display for FailedUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`: {}", self.relative, self.reason)?;
        if self.retryable {
            f.write_str(" (transient; a later run may succeed)")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(UploadedFile),
    /// Not a valid card file name; never sent to storage.
    Skipped(String),
    Failed(FailedUpload),
}

/// Tally of one directory's upload tasks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// In completion order.
    pub uploaded: Vec<UploadedFile>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedUpload>,
    /// Files never submitted because an earlier failure aborted the
    /// directory.
    pub abandoned: usize,
}
impl UploadReport {
    fn record(&mut self, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Uploaded(file) => self.uploaded.push(file),
            UploadOutcome::Skipped(relative) => self.skipped.push(relative),
            UploadOutcome::Failed(failed) => self.failed.push(failed),
        }
    }

    fn failure_summary(&self) -> String {
        let files: Vec<String> = self.failed.iter().map(FailedUpload::to_string).collect();
        format!("{} of {} file(s) failed: {}", self.failed.len(), self.attempted(), files.join(", "))
    }

    fn attempted(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }
}

/// Upload every valid card file below `directory` to the collection's folder.
///
/// With [`UploadFailurePolicy::AbortDirectory`], the first failure stops new
/// uploads from being submitted; uploads already in flight are allowed to
/// finish, then an [`ErrorKind::Upload`] error is raised. With
/// [`UploadFailurePolicy::SkipFile`], failures are only recorded in the
/// returned [`UploadReport`].
#[instrument(skip_all, fields(path = %directory.display(), collection = %collection, category = %category))]
pub async fn upload_directory(
    ctx: &Context,
    directory: &Path,
    collection: &str,
    category: &Category,
) -> Result<UploadReport> {
    let files = list_files(directory).await?;
    let folder = collection_key(category, collection);
    tracing::info!(files = files.len(), key = %folder, "uploading files");

    let mut pending = files.into_iter().map(|path| upload_file(&ctx.storage, directory, &folder, path));
    let mut processing = FuturesUnordered::new();
    processing.extend(pending.by_ref().take(ctx.concurrency));
    let mut report = UploadReport::default();
    let mut aborting = false;
    while let Some(outcome) = processing.next().await {
        let failed = matches!(outcome, UploadOutcome::Failed(_));
        if failed && ctx.on_upload_failure == UploadFailurePolicy::AbortDirectory {
            aborting = true;
        }
        report.record(outcome);
        if !aborting && let Some(next) = pending.next() {
            processing.push(next);
        }
    }
    report.abandoned = pending.count();

    if aborting {
        exn::bail!(ErrorKind::Upload(report.failure_summary()));
    }
    tracing::info!(
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "finished uploading files"
    );
    Ok(report)
}

async fn upload_file(storage: &BackendHandle, directory: &Path, folder: &str, path: PathBuf) -> UploadOutcome {
    let relative = relative_path(directory, &path);
    let Some(card) = validate(&relative) else {
        tracing::warn!(path = %relative, "invalid card file name; skipping file");
        return UploadOutcome::Skipped(relative);
    };
    let file_name = canonical_file_name(&relative, &card);
    let key = format!("{folder}/{file_name}");
    let options = UploadOptions::public(content_type(&card));
    match storage.upload(&path, Path::new(&key), &options).await {
        Ok(()) => {
            tracing::debug!(path = %relative, key = %key, "uploaded file");
            UploadOutcome::Uploaded(UploadedFile { relative, file_name, key, card })
        },
        Err(err) => {
            let retryable = err.is_retryable();
            tracing::error!(path = %relative, key = %key, retryable, error = ?err, "upload failed");
            UploadOutcome::Failed(FailedUpload { relative, reason: (*err).to_string(), retryable })
        },
    }
}

/// `path` relative to `directory`, joined with forward slashes.
fn relative_path(directory: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(directory).unwrap_or(path);
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

/// Every regular file below `directory`, recursively, in path order.
async fn list_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut directories = vec![directory.to_path_buf()];
    while let Some(current) = directories.pop() {
        let mut entries = tokio::fs::read_dir(&current).await.or_raise(|| ErrorKind::Discovery(current.clone()))?;
        while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Discovery(current.clone()))? {
            let file_type = entry.file_type().await.or_raise(|| ErrorKind::Discovery(entry.path()))?;
            if file_type.is_dir() {
                directories.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Urls;
    use cardingest_catalog::{Database, SqliteCatalog};
    use cardingest_storage::backend::MockBackend;
    use rstest::rstest;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn context(
        storage: MockBackend,
        policy: UploadFailurePolicy,
        concurrency: usize,
    ) -> (Context, Arc<MockBackend>) {
        let storage = Arc::new(storage);
        let db = Database::connect_in_memory().await.unwrap();
        let ctx = Context {
            storage: storage.clone(),
            catalog: Arc::new(SqliteCatalog::from(&db)),
            urls: Urls { public_base: "https://cdn.test".to_string(), short_base: "https://s.test".to_string() },
            groups: Vec::new(),
            concurrency,
            on_upload_failure: policy,
        };
        (ctx, storage)
    }

    fn directory(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, file.as_bytes()).unwrap();
        }
        dir
    }

    fn girlgroups() -> Category {
        Category::new("girlgroups", false)
    }

    #[rstest]
    #[case(Category::new("girlgroups", false), "cards/girlgroups/twice")]
    #[case(Category::new("boygroups", true), "promo/boygroups/twice")]
    fn test_collection_key(#[case] category: Category, #[case] expected: &str) {
        assert_eq!(collection_key(&category, "twice"), expected);
    }

    #[rstest]
    #[case("1_abc.png", "1_abc.jpg")]
    #[case("1_abc.JPEG", "1_abc.jpg")]
    #[case("1_abc.jpg", "1_abc.jpg")]
    #[case("1_abc.gif", "1_abc.gif")]
    #[case("1_abc.GIF", "1_abc.gif")]
    #[case("1_abc.jpg.bak", "1_abc.jpg.jpg")]
    fn test_canonical_file_name(#[case] relative: &str, #[case] expected: &str) {
        let card = validate(relative).unwrap();
        assert_eq!(canonical_file_name(relative, &card), expected);
    }

    #[tokio::test]
    async fn test_uploads_valid_files_and_skips_the_rest() {
        let dir = directory(&["1_abc.jpg", "2_abc.png", "bad!name.jpg", "nested/3_def.jpg"]);
        let (ctx, storage) = context(MockBackend::default(), UploadFailurePolicy::AbortDirectory, 2).await;
        let report = upload_directory(&ctx, dir.path(), "twice", &girlgroups()).await.unwrap();

        let mut uploaded: Vec<_> = report.uploaded.iter().map(|f| f.relative.as_str()).collect();
        uploaded.sort();
        assert_eq!(uploaded, vec!["1_abc.jpg", "2_abc.png"]);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(
            storage.keys().await,
            vec![PathBuf::from("cards/girlgroups/twice/1_abc.jpg"), PathBuf::from("cards/girlgroups/twice/2_abc.jpg")]
        );
        let object = storage.get("cards/girlgroups/twice/2_abc.jpg").await.unwrap();
        assert_eq!(object.options.content_type, "image/jpeg");
        assert_eq!(object.data, b"2_abc.png");
    }

    #[tokio::test]
    async fn test_animated_files_keep_their_type() {
        let dir = directory(&["4_dance.gif"]);
        let (ctx, storage) = context(MockBackend::default(), UploadFailurePolicy::AbortDirectory, 4).await;
        let report = upload_directory(&ctx, dir.path(), "itzy", &Category::new("girlgroups", true)).await.unwrap();
        assert_eq!(report.uploaded[0].key, "promo/girlgroups/itzy/4_dance.gif");
        let object = storage.get("promo/girlgroups/itzy/4_dance.gif").await.unwrap();
        assert_eq!(object.options.content_type, "image/gif");
    }

    #[tokio::test]
    async fn test_failure_aborts_directory() {
        let dir = directory(&["1_a.jpg", "2_b.jpg", "3_broken.jpg", "4_d.jpg", "5_e.jpg"]);
        let storage = MockBackend::default().failing_on("3_broken");
        // One at a time, so nothing after the failure is ever submitted.
        let (ctx, storage) = context(storage, UploadFailurePolicy::AbortDirectory, 1).await;
        let err = upload_directory(&ctx, dir.path(), "twice", &girlgroups()).await.unwrap_err();
        assert_eq!(err.code(), 1);
        assert!(matches!(&*err, ErrorKind::Upload(message) if message.contains("3_broken.jpg")));
        assert_eq!(storage.keys().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_skipped_when_configured() {
        let dir = directory(&["1_a.jpg", "2_b.jpg", "3_broken.jpg", "4_d.jpg", "5_e.jpg"]);
        let storage = MockBackend::default().failing_on("3_broken");
        let (ctx, storage) = context(storage, UploadFailurePolicy::SkipFile, 3).await;
        let report = upload_directory(&ctx, dir.path(), "twice", &girlgroups()).await.unwrap();
        assert_eq!(report.uploaded.len(), 4);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].relative, "3_broken.jpg");
        // Injected failures are network errors.
        assert!(report.failed[0].retryable);
        assert_eq!(report.abandoned, 0);
        assert_eq!(storage.keys().await.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = directory(&[]);
        let (ctx, _storage) = context(MockBackend::default(), UploadFailurePolicy::AbortDirectory, 16).await;
        let report = upload_directory(&ctx, dir.path(), "twice", &girlgroups()).await.unwrap();
        assert_eq!(report, UploadReport::default());
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = directory(&[]);
        let (ctx, _storage) = context(MockBackend::default(), UploadFailurePolicy::AbortDirectory, 16).await;
        let err = upload_directory(&ctx, &dir.path().join("gone"), "twice", &girlgroups()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Discovery(_)));
    }

    #[rstest]
    #[case(true, "`nested/1_a.jpg`: network error: timed out (transient; a later run may succeed)")]
    #[case(false, "`nested/1_a.jpg`: permission denied: /in/nested/1_a.jpg")]
    fn test_failed_upload_display(#[case] retryable: bool, #[case] expected: &str) {
        let reason = match retryable {
            true => "network error: timed out",
            false => "permission denied: /in/nested/1_a.jpg",
        };
        let failed = FailedUpload { relative: "nested/1_a.jpg".to_string(), reason: reason.to_string(), retryable };
        assert_eq!(failed.to_string(), expected);
    }
}
