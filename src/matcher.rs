use crate::catalog::{ChannelCatalog, EmoteRecord};
use std::collections::HashSet;

/// Find the catalog emotes used in a message
///
/// Tokens are whitespace-separated and must equal an emote name exactly
/// (case-sensitive, no punctuation stripping). Each emote appears at most once,
/// in order of first occurrence.
pub fn find_matches<'a>(text: &str, catalog: &'a ChannelCatalog) -> Vec<&'a EmoteRecord> {
    if catalog.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    text.split_whitespace()
        .filter_map(|token| catalog.get(token))
        .filter(|&record| seen.insert(record.name.as_str()))
        .collect()
}
