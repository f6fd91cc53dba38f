//! Identifier extraction from Wowhead-style URLs.
//!
//! Recognized shapes: `/item=12345`, `/item/12345-name`, `?spell=678`,
//! matched case-insensitively. Only the first matching digit run counts.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static ITEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[/?&#])item[=/](\d+)").expect("valid regex"));
static SPELL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[/?&#])spell[=/](\d+)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Item,
    Spell,
}

impl IdKind {
    /// Path segment used by Wowhead for this kind of identifier.
    pub fn segment(self) -> &'static str {
        match self {
            IdKind::Item => "item",
            IdKind::Spell => "spell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractedId {
    pub kind: IdKind,
    pub id: u64,
}

pub fn extract_item_id(url: &str) -> Option<u64> {
    first_id(&ITEM_ID_RE, url)
}

pub fn extract_spell_id(url: &str) -> Option<u64> {
    first_id(&SPELL_ID_RE, url)
}

/// Extract an identifier, preferring an item identifier over a spell one.
pub fn extract_id(url: &str) -> Option<ExtractedId> {
    extract_item_id(url)
        .map(|id| ExtractedId { kind: IdKind::Item, id })
        .or_else(|| extract_spell_id(url).map(|id| ExtractedId { kind: IdKind::Spell, id }))
}

// Zero and out-of-range digit runs are treated as absent.
fn first_id(re: &Regex, url: &str) -> Option<u64> {
    let caps = re.captures(url)?;
    caps[1].parse::<u64>().ok().filter(|&id| id > 0)
}
