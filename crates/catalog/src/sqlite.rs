//! Document-store catalog backed by SQLite.

use crate::error::{ErrorKind, Result};
use crate::models::{CardRow, CollectionRow};
use crate::{Card, Catalog, Category, Collection, Database, NewCard};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use time::OffsetDateTime;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    name: String,
    pool: SqlitePool,
}
impl From<&Database> for SqliteCatalog {
    fn from(db: &Database) -> Self {
        Self::new("sqlite", db)
    }
}
impl SqliteCatalog {
    pub fn new(name: impl Into<String>, db: &Database) -> Self {
        Self { name: name.into(), pool: db.pool().clone() }
    }

    fn card_u64(id: i64) -> Result<u64> {
        u64::try_from(id).or_raise(|| ErrorKind::InvalidData("card id"))
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, category), fields(catalog = %self.name, tag = %category.tag))]
    async fn ensure_collection(&self, folder: &str, category: &Category) -> Result<bool> {
        let row = CollectionRow::try_from(&Collection::new(folder, category))?;
        let result = sqlx::query(include_str!("../queries/ensure_collection.sql"))
            .bind(row.id)
            .bind(row.name)
            .bind(row.origin)
            .bind(row.aliases)
            .bind(row.promo)
            .bind(row.compressed)
            .bind(row.rarity)
            .bind(row.tags)
            .bind(row.created_at)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let created = result.rows_affected() == 1;
        if created {
            tracing::info!("created collection");
        }
        Ok(created)
    }

    async fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let row: Option<CollectionRow> = sqlx::query_as(include_str!("../queries/get_collection.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Collection::try_from).transpose()
    }

    async fn next_card_id(&self) -> Result<u64> {
        let (next,): (i64,) = sqlx::query_as(include_str!("../queries/next_card_id.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::card_u64(next)
    }

    #[instrument(skip_all, fields(catalog = %self.name, collection = %card.collection_id, name = %card.name))]
    async fn insert_card(&self, card: NewCard) -> Result<Card> {
        // Stored as whole seconds; keep the returned card identical to what reads back.
        let created_at = OffsetDateTime::now_utc()
            .replace_nanosecond(0)
            .or_raise(|| ErrorKind::InvalidData("creation date"))?;
        let inserted = sqlx::query_as::<_, (i64,)>(include_str!("../queries/insert_card.sql"))
            .bind(&card.name)
            .bind(i64::try_from(card.level).or_raise(|| ErrorKind::InvalidData("card level"))?)
            .bind(&card.collection_id)
            .bind(card.animated)
            .bind(&card.tag)
            .bind(created_at.unix_timestamp())
            .bind(&card.url)
            .bind(&card.short_url)
            .fetch_one(&self.pool)
            .await;
        let (id,) = match inserted {
            Ok(row) => row,
            Err(err) if err.as_database_error().is_some_and(|db| db.is_foreign_key_violation()) => {
                exn::bail!(ErrorKind::UnknownCollection(card.collection_id));
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Database),
        };
        let card = card.into_card(Self::card_u64(id)?, created_at);
        tracing::debug!(id = card.id, "inserted card");
        Ok(card)
    }

    async fn list_cards(&self, collection: Option<&str>) -> Result<Vec<Card>> {
        let rows: Vec<CardRow> = sqlx::query_as(include_str!("../queries/list_cards.sql"))
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Card::try_from).collect()
    }

    async fn list_duplicates(&self, collection: Option<&str>) -> Result<BTreeSet<String>> {
        let names: Vec<(String,)> = sqlx::query_as(include_str!("../queries/list_duplicates.sql"))
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(names.into_iter().map(|(name,)| name).collect())
    }
}
