use crate::catalog::RegistryEmote;
use crate::error::Result;
use async_trait::async_trait;

/// Source of channel emote sets
///
/// Implementations return `EmoteTrackerError::CatalogNotFound` when the registry
/// has no emote set for the id. Any other error is treated as transient.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch_emotes(&self, twitch_id: &str) -> Result<Vec<RegistryEmote>>;
}
