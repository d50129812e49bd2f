//! On-disk layout of usage data

use crate::catalog::image_url_for;
use crate::usage::{ChannelUsage, EmoteSnapshot, UsageCounter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One channel in the saved document; the document is a JSON array of these
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedChannel {
    pub channel_name: String,
    pub total_messages: u64,
    pub total_emotes_used: u64,
    #[serde(default)]
    pub emotes: Vec<PersistedEmote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEmote {
    pub emote_name: String,
    pub count: u64,
    pub last_used: DateTime<Utc>,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
}

impl From<&ChannelUsage> for PersistedChannel {
    fn from(usage: &ChannelUsage) -> Self {
        Self {
            channel_name: usage.channel.clone(),
            total_messages: usage.total_messages,
            total_emotes_used: usage.total_emote_events,
            emotes: usage
                .counters
                .values()
                .map(|counter| PersistedEmote {
                    emote_name: counter.emote_name.clone(),
                    count: counter.count,
                    last_used: counter.last_used_at,
                    channel: usage.channel.clone(),
                    emote_id: counter.snapshot.as_ref().map(|s| s.emote_id.clone()),
                    image_url: counter.snapshot.as_ref().map(|s| s.image_url.clone()),
                    animated: counter.snapshot.as_ref().map(|s| s.animated),
                })
                .collect(),
        }
    }
}

impl From<PersistedChannel> for ChannelUsage {
    fn from(record: PersistedChannel) -> Self {
        let mut usage = ChannelUsage::new(record.channel_name);
        usage.total_messages = record.total_messages;
        usage.total_emote_events = record.total_emotes_used;

        for emote in record.emotes {
            if emote.channel != usage.channel {
                tracing::debug!(
                    channel = %usage.channel,
                    emote = %emote.emote_name,
                    recorded_channel = %emote.channel,
                    "Emote filed under a different channel, keeping it with its parent"
                );
            }

            let snapshot = emote.emote_id.map(|emote_id| EmoteSnapshot {
                image_url: emote.image_url.unwrap_or_else(|| image_url_for(&emote_id)),
                animated: emote.animated.unwrap_or(false),
                emote_id,
            });

            usage.counters.insert(
                emote.emote_name.clone(),
                UsageCounter {
                    emote_name: emote.emote_name,
                    count: emote.count,
                    last_used_at: emote.last_used,
                    snapshot,
                },
            );
        }

        usage
    }
}
