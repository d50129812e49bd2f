//! Emote usage aggregation
//!
//! Counts messages and emote uses per channel and answers top-N queries.
//! Persistence lives in `storage`; this module only tracks what changed.

mod store;
mod types;

pub use store::{EXPORT_TOP_N, UsageSnapshot, UsageStore};
pub use types::{ChannelUsage, EmoteSnapshot, RankedEmote, UsageCounter, UsageExport};
