//! Usage counters and aggregate views

use crate::catalog::EmoteRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Catalog fields captured alongside a counter at its most recent use
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmoteSnapshot {
    pub emote_id: String,
    pub image_url: String,
    pub animated: bool,
}

impl From<&EmoteRecord> for EmoteSnapshot {
    fn from(record: &EmoteRecord) -> Self {
        Self {
            emote_id: record.id.clone(),
            image_url: record.image_url.clone(),
            animated: record.animated,
        }
    }
}

/// Usage of one emote in one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageCounter {
    pub emote_name: String,
    pub count: u64,
    pub last_used_at: DateTime<Utc>,
    /// Last write wins; reflects the catalog at the latest use
    pub snapshot: Option<EmoteSnapshot>,
}

/// Message and emote totals for one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelUsage {
    pub channel: String,
    pub total_messages: u64,
    /// Sum of all counter counts
    pub total_emote_events: u64,
    pub counters: BTreeMap<String, UsageCounter>,
}

impl ChannelUsage {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            total_messages: 0,
            total_emote_events: 0,
            counters: BTreeMap::new(),
        }
    }

    pub fn counter(&self, emote_name: &str) -> Option<&UsageCounter> {
        self.counters.get(emote_name)
    }

    /// Counters as ranking rows, in name order
    pub fn rows(&self) -> impl Iterator<Item = RankedEmote> + '_ {
        self.counters.values().map(|counter| RankedEmote {
            channel: self.channel.clone(),
            emote_name: counter.emote_name.clone(),
            count: counter.count,
            last_used_at: counter.last_used_at,
            snapshot: counter.snapshot.clone(),
        })
    }
}

/// One row of a top-N ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEmote {
    pub channel: String,
    pub emote_name: String,
    pub count: u64,
    pub last_used_at: DateTime<Utc>,
    pub snapshot: Option<EmoteSnapshot>,
}

/// Everything the store knows, for dashboards and debugging
#[derive(Debug, Clone, Serialize)]
pub struct UsageExport {
    pub generated_at: DateTime<Utc>,
    pub channels: Vec<ChannelUsage>,
    pub top_global: Vec<RankedEmote>,
}

/// Sort rows by count, highest first, keeping input order among equal counts
pub(crate) fn rank(mut rows: Vec<RankedEmote>, limit: usize) -> Vec<RankedEmote> {
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows.truncate(limit);
    rows
}
