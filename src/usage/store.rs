use crate::usage::types::{
    ChannelUsage, EmoteSnapshot, RankedEmote, UsageCounter, UsageExport, rank,
};
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Number of global rows included in an export
pub const EXPORT_TOP_N: usize = 10;

#[derive(Debug, Default)]
struct StoreState {
    channels: BTreeMap<String, ChannelUsage>,
    /// Bumped on every mutation
    generation: u64,
    /// Generation contained in the last successful save
    persisted_generation: u64,
}

impl StoreState {
    fn bucket(&mut self, channel: &str) -> &mut ChannelUsage {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| ChannelUsage::new(channel))
    }
}

/// A consistent copy of the store taken under a single lock
#[derive(Debug, Clone)]
pub struct UsageSnapshot {
    pub generation: u64,
    pub channels: Vec<ChannelUsage>,
}

/// In-memory emote usage, per channel
///
/// Dirty means something changed since the last successful save.
#[derive(Debug, Default)]
pub struct UsageStore {
    state: RwLock<StoreState>,
}

impl UsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a chat message, whether or not it used any emotes
    pub async fn record_message(&self, channel: &str) {
        let mut state = self.state.write().await;
        state.bucket(channel).total_messages += 1;
        state.generation += 1;
    }

    /// Count one use of an emote; call once per distinct emote per message
    pub async fn record_emote_usage(
        &self,
        channel: &str,
        emote_name: &str,
        snapshot: Option<EmoteSnapshot>,
    ) {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let bucket = state.bucket(channel);

        let counter = bucket
            .counters
            .entry(emote_name.to_string())
            .or_insert_with(|| UsageCounter {
                emote_name: emote_name.to_string(),
                count: 0,
                last_used_at: now,
                snapshot: None,
            });
        counter.count += 1;
        counter.last_used_at = now;
        counter.snapshot = snapshot;

        bucket.total_emote_events += 1;
        state.generation += 1;
    }

    pub async fn channel_usage(&self, channel: &str) -> Option<ChannelUsage> {
        self.state.read().await.channels.get(channel).cloned()
    }

    pub async fn channels(&self) -> Vec<String> {
        self.state.read().await.channels.keys().cloned().collect()
    }

    /// Most used emotes across every channel
    pub async fn top_global(&self, limit: usize) -> Vec<RankedEmote> {
        let state = self.state.read().await;
        let rows = state.channels.values().flat_map(|usage| usage.rows()).collect();
        rank(rows, limit)
    }

    /// Most used emotes in one channel
    pub async fn top_for_channel(&self, channel: &str, limit: usize) -> Vec<RankedEmote> {
        let state = self.state.read().await;
        match state.channels.get(channel) {
            Some(usage) => rank(usage.rows().collect(), limit),
            None => Vec::new(),
        }
    }

    pub async fn export(&self) -> UsageExport {
        let state = self.state.read().await;
        let channels: Vec<ChannelUsage> = state.channels.values().cloned().collect();
        let rows = channels.iter().flat_map(|usage| usage.rows()).collect();

        UsageExport {
            generated_at: Utc::now(),
            top_global: rank(rows, EXPORT_TOP_N),
            channels,
        }
    }

    pub async fn is_dirty(&self) -> bool {
        let state = self.state.read().await;
        state.generation != state.persisted_generation
    }

    pub async fn snapshot(&self) -> UsageSnapshot {
        let state = self.state.read().await;
        UsageSnapshot {
            generation: state.generation,
            channels: state.channels.values().cloned().collect(),
        }
    }

    /// Record that `generation` reached storage
    ///
    /// Mutations made after the snapshot was taken keep the store dirty.
    pub async fn mark_persisted(&self, generation: u64) {
        let mut state = self.state.write().await;
        if generation > state.persisted_generation {
            state.persisted_generation = generation;
        }
    }

    /// Replace all contents with data read from storage; leaves the store clean
    pub async fn restore(&self, channels: Vec<ChannelUsage>) {
        let mut state = self.state.write().await;
        state.channels = channels
            .into_iter()
            .map(|usage| (usage.channel.clone(), usage))
            .collect();
        state.persisted_generation = state.generation;
    }
}
