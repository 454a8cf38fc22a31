use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use time::OffsetDateTime;

/// One uploaded image plus its catalog metadata.
///
/// Serialized with the field names existing `cards.json` files use. Cards
/// written before links were recorded have empty `url`/`short_url`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Unique across the whole catalog, never reused.
    pub id: u64,
    pub name: String,
    pub level: u64,
    /// Owning [`Collection`](crate::Collection) identifier.
    #[serde(rename = "col")]
    pub collection_id: String,
    pub animated: bool,
    /// Category tag of the group the card was ingested from.
    #[serde(rename = "tags")]
    pub tag: String,
    #[serde(rename = "added", with = "super::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(rename = "shorturl", default, skip_serializing_if = "String::is_empty")]
    pub short_url: String,
}

/// A card that has been uploaded but not yet assigned an identifier.
///
/// Identifiers are only ever handed out by
/// [`Catalog::insert_card()`](crate::Catalog::insert_card).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCard {
    pub name: String,
    pub level: u64,
    pub collection_id: String,
    pub animated: bool,
    pub tag: String,
    pub url: String,
    pub short_url: String,
}
impl NewCard {
    pub(crate) fn into_card(self, id: u64, created_at: OffsetDateTime) -> Card {
        Card {
            id,
            name: self.name,
            level: self.level,
            collection_id: self.collection_id,
            animated: self.animated,
            tag: self.tag,
            created_at,
            url: self.url,
            short_url: self.short_url,
        }
    }
}

/// Every card name that occurs more than once in `cards`.
///
/// Callers decide the scope: pass a whole catalog snapshot, or only the cards
/// of one collection.
pub fn detect_duplicate_names<'a>(cards: impl IntoIterator<Item = &'a Card>) -> BTreeSet<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for card in cards {
        *counts.entry(card.name.as_str()).or_default() += 1;
    }
    counts.into_iter().filter(|(_, count)| *count > 1).map(|(name, _)| name.to_string()).collect()
}

#[derive(sqlx::FromRow)]
pub(crate) struct CardRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) level: i64,
    pub(crate) collection_id: String,
    pub(crate) animated: bool,
    pub(crate) tag: String,
    pub(crate) created_at: i64,
    pub(crate) url: String,
    pub(crate) short_url: String,
}
impl TryFrom<CardRow> for Card {
    type Error = Error;
    fn try_from(row: CardRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: u64::try_from(row.id).or_raise(|| ErrorKind::InvalidData("card id"))?,
            name: row.name,
            level: u64::try_from(row.level).or_raise(|| ErrorKind::InvalidData("card level"))?,
            collection_id: row.collection_id,
            animated: row.animated,
            tag: row.tag,
            created_at: OffsetDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
            url: row.url,
            short_url: row.short_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn card(id: u64, name: &str, collection: &str) -> Card {
        NewCard {
            name: name.to_string(),
            level: 1,
            collection_id: collection.to_string(),
            animated: false,
            tag: "girlgroups".to_string(),
            url: String::new(),
            short_url: String::new(),
        }
        .into_card(id, OffsetDateTime::UNIX_EPOCH)
    }

    #[rstest]
    #[case(&[], &[])]
    #[case(&["abc"], &[])]
    #[case(&["abc", "abc"], &["abc"])]
    #[case(&["abc", "def", "abc", "def", "ghi"], &["abc", "def"])]
    #[case(&["irene", "irene", "irene"], &["irene"])]
    fn test_detect_duplicate_names(#[case] names: &[&str], #[case] expected: &[&str]) {
        let cards: Vec<Card> = names.iter().enumerate().map(|(i, n)| card(i as u64, n, "twice")).collect();
        let expected: BTreeSet<String> = expected.iter().map(|s| s.to_string()).collect();
        assert_eq!(detect_duplicate_names(&cards), expected);
    }

    #[test]
    fn test_row_rejects_negative_id() {
        let row = CardRow {
            id: -1,
            name: "abc".to_string(),
            level: 1,
            collection_id: "twice".to_string(),
            animated: false,
            tag: "girlgroups".to_string(),
            created_at: 0,
            url: String::new(),
            short_url: String::new(),
        };
        assert!(Card::try_from(row).is_err());
    }

    #[test]
    fn test_json_shape() {
        let mut card = card(7, "nayeon", "twice");
        card.short_url = "https://s.example.com/cards/girlgroups/twice/1_nayeon.jpg".to_string();
        let json = serde_json::to_value(card).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["col"], "twice");
        assert_eq!(json["tags"], "girlgroups");
        assert_eq!(json["added"], "1970-01-01T00:00:00Z");
        assert_eq!(json["shorturl"], "https://s.example.com/cards/girlgroups/twice/1_nayeon.jpg");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn test_reads_card_without_links() {
        let json = r#"{"name":"irene","level":3,"animated":false,"col":"red_velvet","id":12,"tags":"girlgroups",
            "added":"2023-06-01T12:00:00.123456"}"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.collection_id, "red_velvet");
        assert_eq!(card.tag, "girlgroups");
        assert_eq!(card.created_at, time::macros::datetime!(2023-06-01 12:00:00.123456 UTC));
        assert!(card.url.is_empty() && card.short_url.is_empty());
    }
}
