mod card;
mod collection;
mod timestamp;

pub use self::card::{Card, NewCard, detect_duplicate_names};
pub(crate) use self::card::CardRow;
pub use self::collection::{Category, Collection, UNSET_RARITY};
pub(crate) use self::collection::CollectionRow;
