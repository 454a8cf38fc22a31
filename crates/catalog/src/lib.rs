//! Card and collection catalog.
//!
//! The catalog is the record of every card that has been ingested and every
//! collection (source folder) it belongs to. Two interchangeable backends are
//! provided behind the [`Catalog`] trait:
//! - [`SqliteCatalog`]: a document store in a SQLite database; identifier
//!   assignment and insertion happen in a single statement.
//! - [`JsonCatalog`]: two flat JSON files (cards, collections) loaded into
//!   memory on open and rewritten on [`Catalog::flush()`].
//!
//! # Identifiers
//! Card identifiers are assigned by [`Catalog::insert_card()`] as one more
//! than the current maximum (or `0` for an empty catalog). They are unique
//! and never reused within a catalog.

mod db;
pub mod error;
mod json;
mod models;
mod sqlite;

pub use crate::db::Database;
pub use crate::json::JsonCatalog;
pub use crate::models::{Card, Category, Collection, NewCard, UNSET_RARITY, detect_duplicate_names};
pub use crate::sqlite::SqliteCatalog;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

pub type CatalogHandle = Arc<dyn Catalog + Send + Sync>;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Human-readable backend name, for logs.
    fn name(&self) -> &str;

    /// Create the collection for `folder` if it does not exist yet.
    ///
    /// Returns `true` when a new record was written. An existing collection
    /// is never modified.
    async fn ensure_collection(&self, folder: &str, category: &Category) -> Result<bool>;

    async fn get_collection(&self, id: &str) -> Result<Option<Collection>>;

    /// The identifier the next inserted card would receive.
    ///
    /// Informational only: [`insert_card()`](Catalog::insert_card) assigns
    /// the identifier itself, so the value may be stale by the time a card is
    /// inserted.
    async fn next_card_id(&self) -> Result<u64>;

    /// Assign the next identifier to `card` and persist it.
    ///
    /// Fails with [`ErrorKind::UnknownCollection`](crate::error::ErrorKind::UnknownCollection)
    /// if the card's collection has not been created.
    async fn insert_card(&self, card: NewCard) -> Result<Card>;

    /// Cards in identifier order, optionally restricted to one collection.
    async fn list_cards(&self, collection: Option<&str>) -> Result<Vec<Card>>;

    /// Card names that occur more than once, optionally restricted to one
    /// collection.
    async fn list_duplicates(&self, collection: Option<&str>) -> Result<BTreeSet<String>> {
        let cards = self.list_cards(collection).await?;
        Ok(detect_duplicate_names(&cards))
    }

    /// Make every write so far durable.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
