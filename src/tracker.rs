use crate::catalog::CatalogCache;
use crate::chat::ChatMessage;
use crate::config::TrackedChannel;
use crate::matcher::find_matches;
use crate::usage::{EmoteSnapshot, UsageStore};
use std::collections::HashMap;
use std::sync::Arc;

/// Routes chat messages through the catalog cache, matcher and usage store
pub struct EmoteTracker {
    cache: Arc<CatalogCache>,
    store: Arc<UsageStore>,
    channels: HashMap<String, TrackedChannel>,
}

impl EmoteTracker {
    pub fn new(
        cache: Arc<CatalogCache>,
        store: Arc<UsageStore>,
        channels: impl IntoIterator<Item = TrackedChannel>,
    ) -> Self {
        Self {
            cache,
            store,
            channels: channels
                .into_iter()
                .map(|c| (c.login.clone(), c))
                .collect(),
        }
    }

    pub fn tracked(&self, channel: &str) -> Option<&TrackedChannel> {
        self.channels.get(channel)
    }

    /// Record a message from any channel; untracked channels are ignored
    ///
    /// Returns the names of the emotes counted for this message.
    pub async fn handle_message(&self, message: &ChatMessage) -> Vec<String> {
        match self.channels.get(&message.channel) {
            Some(channel) => {
                tracing::trace!(
                    channel = %channel.login,
                    sender = %message.sender.best_name(),
                    "Processing chat message"
                );
                self.process(channel, &message.text).await
            }
            None => {
                tracing::trace!(channel = %message.channel, "Message from untracked channel");
                Vec::new()
            }
        }
    }

    /// Count the message, then each distinct emote in it once
    pub async fn process(&self, channel: &TrackedChannel, text: &str) -> Vec<String> {
        self.store.record_message(&channel.login).await;

        let catalog = self.cache.get_or_fetch(channel).await;
        let matches = find_matches(text, &catalog);

        for record in &matches {
            self.store
                .record_emote_usage(
                    &channel.login,
                    &record.name,
                    Some(EmoteSnapshot::from(*record)),
                )
                .await;
        }

        if !matches.is_empty() {
            tracing::debug!(
                channel = %channel.login,
                emotes = matches.len(),
                "Recorded emote usage"
            );
        }

        matches.into_iter().map(|r| r.name.clone()).collect()
    }
}
