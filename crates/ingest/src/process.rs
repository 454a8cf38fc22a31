//! Per-directory pipeline: folder marker, normalization, upload, catalog.

use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::normalize::normalize;
use crate::upload::{UploadedFile, collection_key, upload_directory};
use cardingest_catalog::{Card, Category, NewCard};
use derive_more::Display;
use exn::{OptionExt, ResultExt};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::instrument;

/// Progress of a directory through the pipeline, in order.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    #[display("start")]
    Start,
    #[display("folder created")]
    FolderCreated,
    #[display("files renamed")]
    FilesRenamed,
    #[display("files uploaded")]
    FilesUploaded,
    #[display("catalog updated")]
    CatalogUpdated,
    #[display("done")]
    Done,
}

/// Why a directory did not reach [`Stage::Done`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    /// See [`ErrorKind::code()`].
    pub code: u8,
    pub message: String,
}

/// Everything that happened to one collection directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryOutcome {
    pub collection: String,
    pub category: Category,
    /// Last stage completed successfully.
    pub stage: Stage,
    pub failure: Option<Failure>,
    /// Whether this run created the collection record.
    pub collection_created: bool,
    /// Relative paths of uploaded files, in path order. Empty if the
    /// directory failed.
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    /// Cards inserted by this run, in identifier order.
    pub cards: Vec<Card>,
    /// Names occurring more than once in the collection after this run.
    pub duplicates: BTreeSet<String>,
    /// Per-file problems that did not fail the directory.
    pub errors: Vec<String>,
}
impl DirectoryOutcome {
    fn new(collection: impl Into<String>, category: &Category) -> Self {
        Self {
            collection: collection.into(),
            category: category.clone(),
            stage: Stage::Start,
            failure: None,
            collection_created: false,
            uploaded: Vec::new(),
            skipped: Vec::new(),
            cards: Vec::new(),
            duplicates: BTreeSet::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn first_card_id(&self) -> Option<u64> {
        self.cards.iter().map(|card| card.id).min()
    }

    pub fn last_card_id(&self) -> Option<u64> {
        self.cards.iter().map(|card| card.id).max()
    }
}

/// Run one collection directory through the whole pipeline.
///
/// Never fails: any error is logged with its full context and recorded in
/// the returned outcome, so that one bad directory cannot stop a batch. A
/// failed directory reports no uploaded files and no new collection, even if
/// some objects or records were written before the failure.
#[instrument(skip_all, fields(path = %directory.display(), category = %category))]
pub async fn process_directory(ctx: &Context, directory: &Path, category: &Category) -> DirectoryOutcome {
    let collection = directory.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
    let mut outcome = DirectoryOutcome::new(collection, category);
    match run(ctx, directory, &mut outcome).await {
        Ok(()) => {
            outcome.stage = Stage::Done;
            tracing::info!(
                collection = %outcome.collection,
                cards = outcome.cards.len(),
                skipped = outcome.skipped.len(),
                created = outcome.collection_created,
                "processed directory"
            );
        },
        Err(err) => {
            tracing::error!(collection = %outcome.collection, stage = %outcome.stage, error = ?err, "directory failed");
            outcome.failure = Some(Failure { code: err.code(), message: (*err).to_string() });
            outcome.uploaded.clear();
            outcome.collection_created = false;
        },
    }
    outcome
}

async fn run(ctx: &Context, directory: &Path, outcome: &mut DirectoryOutcome) -> Result<()> {
    let collection = directory
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .ok_or_raise(|| ErrorKind::Discovery(directory.to_path_buf()))?
        .to_string();
    let category = outcome.category.clone();

    let folder = collection_key(&category, &collection);
    ctx.storage
        .create_folder(Path::new(&folder))
        .await
        .or_raise(|| ErrorKind::Upload(format!("could not create folder `{folder}`")))?;
    outcome.stage = Stage::FolderCreated;

    let renames = normalize(directory).await?;
    tracing::debug!(renamed = renames.len(), "normalized file names");
    outcome.stage = Stage::FilesRenamed;

    let mut report = upload_directory(ctx, directory, &collection, &category).await?;
    report.uploaded.sort_by(|a, b| a.relative.cmp(&b.relative));
    outcome.uploaded = report.uploaded.iter().map(|file| file.relative.clone()).collect();
    outcome.skipped = report.skipped;
    outcome.skipped.sort();
    outcome.errors = report.failed.iter().map(ToString::to_string).collect();
    outcome.stage = Stage::FilesUploaded;

    update_catalog(ctx, &collection, &category, report.uploaded, outcome).await?;
    outcome.stage = Stage::CatalogUpdated;
    Ok(())
}

async fn update_catalog(
    ctx: &Context,
    collection: &str,
    category: &Category,
    uploaded: Vec<UploadedFile>,
    outcome: &mut DirectoryOutcome,
) -> Result<()> {
    // Resolve every card before the first write, so an unstorable level
    // leaves the catalog untouched.
    let cards = uploaded
        .into_iter()
        .map(|file| -> Result<NewCard> {
            let level = file.card.level().ok_or_raise(|| ErrorKind::Level(file.card.digits.clone()))?;
            Ok(NewCard {
                animated: file.card.is_animated(),
                name: file.card.name,
                level,
                collection_id: collection.to_string(),
                tag: category.tag.clone(),
                url: format!("{}/{}", ctx.urls.public_base, file.key),
                short_url: format!("{}/{}", ctx.urls.short_base, file.key),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    outcome.collection_created =
        ctx.catalog.ensure_collection(collection, category).await.or_raise(|| ErrorKind::Catalog)?;
    for card in cards {
        let card = ctx.catalog.insert_card(card).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::debug!(card_id = card.id, name = %card.name, "added card");
        outcome.cards.push(card);
    }
    outcome.duplicates = ctx.catalog.list_duplicates(Some(collection)).await.or_raise(|| ErrorKind::Catalog)?;
    if !outcome.duplicates.is_empty() {
        tracing::warn!(collection, duplicates = ?outcome.duplicates, "collection has duplicate card names");
    }
    Ok(())
}
