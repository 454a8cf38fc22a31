use crate::error::{ErrorKind, Result};
use crate::process::{DirectoryOutcome, process_directory};
use crate::{Context, report};
use async_stream::stream;
use cardingest_catalog::Category;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::pin::pin;

/// Progress events emitted by [`batch`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete), exactly once, with the
///    number of collection directories found.
/// 3. [`Processed`](Self::Processed), once per directory, in discovery order,
///    after its report block has been written.
/// 4. [`Complete`](Self::Complete), exactly once, after the catalog has been
///    flushed.
///
/// A batch-level error (discovery, report file, final flush) terminates the
/// stream early, in which case [`Complete`](Self::Complete) is never emitted.
/// Directory failures are not batch-level errors.
pub enum BatchEvent {
    Started,
    DiscoveryComplete(u64),
    Processed(Box<DirectoryOutcome>),
    Complete(Summary),
}

/// Totals for a whole batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub directories: usize,
    pub failed: usize,
    pub collections_created: usize,
    pub cards: usize,
}
impl Summary {
    fn record(&mut self, outcome: &DirectoryOutcome) {
        self.directories += 1;
        self.failed += usize::from(outcome.is_failed());
        self.collections_created += usize::from(outcome.collection_created);
        self.cards += outcome.cards.len();
    }
}

/// Collection directories below every root, for every configured group.
///
/// Roots are visited in the order given, groups in configuration order, and
/// the directories of one group in name order. A group directory missing from
/// a root is skipped.
async fn discover(ctx: &Context, roots: &[PathBuf]) -> Result<Vec<(PathBuf, Category)>> {
    let mut found = Vec::new();
    for root in roots {
        for group in &ctx.groups {
            let base = root.join(&group.source);
            let mut entries = match tokio::fs::read_dir(&base).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == IoErrorKind::NotFound => {
                    tracing::info!(
                        path = %base.display(),
                        category = %group.category,
                        "group directory not found; skipping"
                    );
                    continue;
                },
                Err(err) => return Err(err).or_raise(|| ErrorKind::Discovery(base.clone())),
            };
            let mut directories = Vec::new();
            while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Discovery(base.clone()))? {
                if entry.file_type().await.or_raise(|| ErrorKind::Discovery(entry.path()))?.is_dir() {
                    directories.push(entry.path());
                }
            }
            directories.sort();
            found.extend(directories.into_iter().map(|directory| (directory, group.category.clone())));
        }
    }
    Ok(found)
}

/// Streams [`BatchEvent`]s while every collection directory below `roots` is
/// processed in turn, appending one block per directory to `report`.
pub fn batch<'a>(
    ctx: &'a Context,
    roots: &'a [PathBuf],
    report: &'a Path,
) -> impl Stream<Item = Result<BatchEvent>> + 'a {
    stream!({
        yield Ok(BatchEvent::Started);

        let directories = match discover(ctx, roots).await {
            Ok(d) => d,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        tracing::info!(directories = directories.len(), "discovered collection directories");
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(BatchEvent::DiscoveryComplete(u64::try_from(directories.len()).unwrap_or(0)));

        let mut summary = Summary::default();
        let mut failure = None;
        for (directory, category) in directories {
            let outcome = process_directory(ctx, &directory, &category).await;
            summary.record(&outcome);
            if let Err(e) = report::append(report, &report::render(&outcome)).await {
                failure = Some(e);
                break;
            }
            yield Ok(BatchEvent::Processed(Box::new(outcome)));
        }

        // Flush even after a report failure, so catalog writes that already
        // happened are not lost.
        let flushed = ctx.catalog.flush().await.or_raise(|| ErrorKind::Catalog);
        if let Some(e) = failure.or(flushed.err()) {
            yield Err(e);
            return;
        }
        tracing::info!(
            directories = summary.directories,
            failed = summary.failed,
            collections_created = summary.collections_created,
            cards = summary.cards,
            "batch complete"
        );
        yield Ok(BatchEvent::Complete(summary));
    })
}

/// Run a whole [`batch`], returning its [`Summary`].
pub async fn run(ctx: &Context, roots: &[PathBuf], report: &Path) -> Result<Summary> {
    let mut events = pin!(batch(ctx, roots, report));
    let mut summary = Summary::default();
    while let Some(event) = events.next().await {
        if let BatchEvent::Complete(complete) = event? {
            summary = complete;
        }
    }
    Ok(summary)
}
