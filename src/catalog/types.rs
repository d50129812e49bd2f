//! Catalog types for per-channel emote sets

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// CDN location of the smallest rendition of an emote
pub fn image_url_for(emote_id: &str) -> String {
    format!("https://cdn.7tv.app/emote/{}/1x.webp", emote_id)
}

/// An emote as the registry reports it, before any derived fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEmote {
    pub id: String,
    pub name: String,
    pub animated: bool,
}

/// Emote metadata as it sits in a channel catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmoteRecord {
    /// Registry-assigned id (e.g., 01F6MZGCNG000255K4X1K0NEJ5)
    pub id: String,

    /// Chat token that triggers the emote; case-sensitive
    pub name: String,

    pub image_url: String,

    pub animated: bool,
}

impl From<RegistryEmote> for EmoteRecord {
    fn from(emote: RegistryEmote) -> Self {
        Self {
            image_url: image_url_for(&emote.id),
            id: emote.id,
            name: emote.name,
            animated: emote.animated,
        }
    }
}

/// Snapshot of one channel's emote set at a point in time
///
/// Catalogs are never edited in place; a refresh builds a new one and swaps it in.
#[derive(Debug, Clone)]
pub struct ChannelCatalog {
    /// Channel login (e.g., "forsen")
    pub channel: String,

    /// Emotes keyed by name
    pub entries: HashMap<String, EmoteRecord>,

    /// When this catalog was fetched
    pub fetched_at: Instant,
}

impl ChannelCatalog {
    pub fn empty(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            entries: HashMap::new(),
            fetched_at: Instant::now(),
        }
    }

    /// Build a catalog from a registry response
    pub fn from_registry(channel: impl Into<String>, emotes: Vec<RegistryEmote>) -> Self {
        let channel = channel.into();
        let mut entries = HashMap::with_capacity(emotes.len());

        for emote in emotes {
            let record = EmoteRecord::from(emote);
            if let Some(previous) = entries.insert(record.name.clone(), record) {
                tracing::debug!(
                    channel = %channel,
                    emote = %previous.name,
                    "Registry returned duplicate emote name, keeping the last one"
                );
            }
        }

        Self {
            channel,
            entries,
            fetched_at: Instant::now(),
        }
    }

    /// Fresh while younger than the TTL
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }

    pub fn get(&self, name: &str) -> Option<&EmoteRecord> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
