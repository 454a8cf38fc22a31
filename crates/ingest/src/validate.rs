//! Card file name validation.
//!
//! A card file is named `<level>_<name>.<ext>`, where `name` is one or more
//! word characters (so it may itself contain underscores, as in
//! `12_red_velvet_irene.jpg`). Only the start of the relative path has to
//! match: trailing text after a valid `<level>_<name>.<ext>` prefix is
//! accepted, and a file inside a sub-directory never matches because the
//! directory name comes first.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static CARD_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)_(\w+)\.(\w+)").unwrap());

/// Extension of animated images; everything else is treated as a still.
pub const ANIMATED_EXTENSION: &str = "gif";

/// The parts of a valid card file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardName {
    /// Leading digits exactly as written; see [`CardName::level()`].
    pub digits: String,
    /// Card display name, lower-cased.
    pub name: String,
    /// Real extension of the file, lower-cased (empty if it has none).
    pub extension: String,
}
impl CardName {
    /// Numeric level, or `None` if the digits are too large to store.
    pub fn level(&self) -> Option<u64> {
        self.digits.parse().ok()
    }

    pub fn is_animated(&self) -> bool {
        self.extension == ANIMATED_EXTENSION
    }
}

/// Parse a path relative to a collection directory, using `/` separators.
///
/// Returns `None` if the path is not a valid card file name. Any number of
/// leading digits is accepted here; whether the level can be stored is up to
/// the catalog.
pub fn validate(relative: &str) -> Option<CardName> {
    let captures = CARD_FILE_NAME.captures(relative)?;
    let digits = captures[1].to_string();
    let extension = Path::new(relative)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    Some(CardName { digits, name: captures[2].to_lowercase(), extension })
}
