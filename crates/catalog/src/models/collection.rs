use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use time::OffsetDateTime;

/// Rarity of a collection that nobody has graded yet.
pub const UNSET_RARITY: i64 = -1;

/// Top-level grouping a collection folder was discovered under.
///
/// The tag doubles as a storage key segment (`cards/<tag>/...`) and as the
/// category tag recorded on every card and collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub tag: String,
    pub promo: bool,
}
impl Category {
    pub fn new(tag: impl Into<String>, promo: bool) -> Self {
        Self { tag: tag.into(), promo }
    }
}
/// `girlgroups`, or `promo/girlgroups` for promotional content.
impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.promo {
            true => write!(f, "promo/{}", self.tag),
            false => f.write_str(&self.tag),
        }
    }
}

/// A named group of cards, one per source folder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Source folder name; unique.
    pub id: String,
    /// Display name (upper-cased identifier).
    pub name: String,
    #[serde(default)]
    pub origin: Option<String>,
    pub aliases: BTreeSet<String>,
    #[serde(default)]
    pub promo: bool,
    #[serde(default = "default_compressed")]
    pub compressed: bool,
    #[serde(default = "default_rarity")]
    pub rarity: i64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Unknown for collections created before it was recorded.
    #[serde(rename = "added", default, skip_serializing_if = "Option::is_none", with = "super::timestamp::option")]
    pub created_at: Option<OffsetDateTime>,
}

fn default_compressed() -> bool {
    true
}

fn default_rarity() -> i64 {
    UNSET_RARITY
}

impl Collection {
    /// A fresh collection record for a folder seen for the first time.
    pub fn new(folder: impl Into<String>, category: &Category) -> Self {
        let id = folder.into();
        Self {
            name: id.to_uppercase(),
            origin: None,
            aliases: BTreeSet::from([id.clone()]),
            promo: category.promo,
            compressed: true,
            rarity: UNSET_RARITY,
            tags: BTreeSet::from([category.tag.clone()]),
            created_at: Some(OffsetDateTime::now_utc()),
            id,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CollectionRow {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) origin: Option<String>,
    pub(crate) aliases: String,
    pub(crate) promo: bool,
    pub(crate) compressed: bool,
    pub(crate) rarity: i64,
    pub(crate) tags: String,
    pub(crate) created_at: Option<i64>,
}
impl TryFrom<&Collection> for CollectionRow {
    type Error = Error;
    fn try_from(collection: &Collection) -> Result<Self, Self::Error> {
        Ok(Self {
            id: collection.id.clone(),
            name: collection.name.clone(),
            origin: collection.origin.clone(),
            aliases: serde_json::to_string(&collection.aliases).or_raise(|| ErrorKind::InvalidData("aliases"))?,
            promo: collection.promo,
            compressed: collection.compressed,
            rarity: collection.rarity,
            tags: serde_json::to_string(&collection.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
            created_at: collection.created_at.map(OffsetDateTime::unix_timestamp),
        })
    }
}
impl TryFrom<CollectionRow> for Collection {
    type Error = Error;
    fn try_from(row: CollectionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            origin: row.origin,
            aliases: serde_json::from_str(&row.aliases).or_raise(|| ErrorKind::InvalidData("aliases"))?,
            promo: row.promo,
            compressed: row.compressed,
            rarity: row.rarity,
            tags: serde_json::from_str(&row.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
            created_at: row
                .created_at
                .map(OffsetDateTime::from_unix_timestamp)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_collection_defaults() {
        let collection = Collection::new("red_velvet", &Category::new("girlgroups", false));
        assert_eq!(collection.id, "red_velvet");
        assert_eq!(collection.name, "RED_VELVET");
        assert_eq!(collection.origin, None);
        assert_eq!(collection.aliases, BTreeSet::from(["red_velvet".to_string()]));
        assert!(!collection.promo);
        assert!(collection.compressed);
        assert_eq!(collection.rarity, UNSET_RARITY);
        assert_eq!(collection.tags, BTreeSet::from(["girlgroups".to_string()]));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::new("girlgroups", false).to_string(), "girlgroups");
        assert_eq!(Category::new("boygroups", true).to_string(), "promo/boygroups");
    }

    #[test]
    fn test_row_round_trip_keeps_sets() {
        let collection = Collection::new("bts", &Category::new("boygroups", true));
        let row = CollectionRow::try_from(&collection).unwrap();
        assert_eq!(row.aliases, r#"["bts"]"#);
        let back = Collection::try_from(row).unwrap();
        assert!(back.promo);
        // Unix timestamps (seconds) strip the nanoseconds component.
        assert_eq!(back.created_at, collection.created_at.map(|at| at.replace_nanosecond(0).unwrap()));
    }

    #[test]
    fn test_json_defaults_for_missing_fields() {
        let json = r#"{"id":"aespa","name":"AESPA","aliases":["aespa"]}"#;
        let collection: Collection = serde_json::from_str(json).unwrap();
        assert!(collection.compressed);
        assert!(!collection.promo);
        assert_eq!(collection.rarity, UNSET_RARITY);
        assert!(collection.tags.is_empty());
        assert_eq!(collection.created_at, None);

        let json = serde_json::to_value(&collection).unwrap();
        assert!(json.get("added").is_none());
    }

    #[test]
    fn test_row_without_creation_date() {
        let collection = Collection { created_at: None, ..Collection::new("ive", &Category::new("girlgroups", false)) };
        let row = CollectionRow::try_from(&collection).unwrap();
        assert_eq!(row.created_at, None);
        assert_eq!(Collection::try_from(row).unwrap().created_at, None);
    }
}
