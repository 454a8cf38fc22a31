//! Flat-file catalog: one JSON array of cards, one of collections.
//!
//! Both files are read fully into memory when opened. Writes only touch the
//! in-memory snapshot until [`Catalog::flush()`], which rewrites each file
//! through a temporary sibling and an atomic rename.

use crate::error::{ErrorKind, Result};
use crate::{Card, Catalog, Category, Collection, NewCard};
use async_trait::async_trait;
use exn::ResultExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::PrettyFormatter;
use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::instrument;

const INDENT: &[u8] = b"    ";

#[derive(Debug, Default)]
struct Snapshot {
    cards: Vec<Card>,
    collections: BTreeMap<String, Collection>,
    next_id: u64,
}
impl Snapshot {
    fn new(cards: Vec<Card>, collections: Vec<Collection>) -> Self {
        let mut seen = HashSet::with_capacity(cards.len());
        for card in &cards {
            if !seen.insert(card.id) {
                tracing::warn!(id = card.id, "card identifier occurs more than once in catalog file");
            }
        }
        let next_id = cards.iter().map(|card| card.id + 1).max().unwrap_or(0);
        let collections = collections.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self { cards, collections, next_id }
    }
}

#[derive(Debug)]
pub struct JsonCatalog {
    cards_path: PathBuf,
    collections_path: PathBuf,
    snapshot: RwLock<Snapshot>,
}

impl JsonCatalog {
    /// Load both catalog files. A file that does not exist yet is treated as
    /// an empty array and created on the first flush.
    #[instrument(skip_all, fields(cards = %cards_path.as_ref().display()))]
    pub async fn open(cards_path: impl AsRef<Path>, collections_path: impl AsRef<Path>) -> Result<Self> {
        let cards_path = cards_path.as_ref().to_path_buf();
        let collections_path = collections_path.as_ref().to_path_buf();
        let cards: Vec<Card> = read_array(&cards_path).await?;
        let collections: Vec<Collection> = read_array(&collections_path).await?;
        tracing::debug!(cards = cards.len(), collections = collections.len(), "loaded catalog files");
        Ok(Self { cards_path, collections_path, snapshot: RwLock::new(Snapshot::new(cards, collections)) })
    }
}

async fn read_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => serde_json::from_slice(&bytes).or_raise(|| ErrorKind::File(path.to_path_buf())),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err).or_raise(|| ErrorKind::File(path.to_path_buf())),
    }
}

async fn write_array<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut bytes = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, PrettyFormatter::with_indent(INDENT));
    items.serialize(&mut serializer).or_raise(|| ErrorKind::InvalidData("catalog file"))?;
    bytes.push(b'\n');

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    tokio::fs::write(&temp, &bytes).await.or_raise(|| ErrorKind::File(temp.clone()))?;
    tokio::fs::rename(&temp, path).await.or_raise(|| ErrorKind::File(path.to_path_buf()))
}

#[async_trait]
impl Catalog for JsonCatalog {
    fn name(&self) -> &str {
        "json"
    }

    async fn ensure_collection(&self, folder: &str, category: &Category) -> Result<bool> {
        let mut snapshot = self.snapshot.write().await;
        if snapshot.collections.contains_key(folder) {
            return Ok(false);
        }
        snapshot.collections.insert(folder.to_string(), Collection::new(folder, category));
        tracing::info!(collection = folder, tag = %category.tag, "created collection");
        Ok(true)
    }

    async fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        Ok(self.snapshot.read().await.collections.get(id).cloned())
    }

    async fn next_card_id(&self) -> Result<u64> {
        Ok(self.snapshot.read().await.next_id)
    }

    async fn insert_card(&self, card: NewCard) -> Result<Card> {
        let mut snapshot = self.snapshot.write().await;
        if !snapshot.collections.contains_key(&card.collection_id) {
            exn::bail!(ErrorKind::UnknownCollection(card.collection_id));
        }
        let card = card.into_card(snapshot.next_id, OffsetDateTime::now_utc());
        snapshot.next_id += 1;
        tracing::debug!(id = card.id, collection = %card.collection_id, name = %card.name, "inserted card");
        snapshot.cards.push(card.clone());
        Ok(card)
    }

    async fn list_cards(&self, collection: Option<&str>) -> Result<Vec<Card>> {
        let snapshot = self.snapshot.read().await;
        let mut cards: Vec<Card> = snapshot
            .cards
            .iter()
            .filter(|card| collection.is_none_or(|id| card.collection_id == id))
            .cloned()
            .collect();
        cards.sort_by_key(|card| card.id);
        Ok(cards)
    }

    #[instrument(skip(self), fields(cards = %self.cards_path.display()))]
    async fn flush(&self) -> Result<()> {
        // Hold the write lock so no insert lands between the two files.
        let snapshot = self.snapshot.write().await;
        let collections: Vec<&Collection> = snapshot.collections.values().collect();
        write_array(&self.collections_path, &collections).await?;
        write_array(&self.cards_path, &snapshot.cards).await?;
        tracing::info!(cards = snapshot.cards.len(), collections = collections.len(), "flushed catalog files");
        Ok(())
    }
}
