//! Per-channel emote catalogs
//!
//! Catalogs come from an external registry and are cached per channel:
//! - TTL-based: refetched at most once per TTL (5 minutes by default)
//! - Wholesale replacement: a refresh swaps the whole set, never patches it
//! - Negative caching: a channel without a catalog is cached as empty
//! - Transient failures are never cached, the next lookup retries

mod cache;
mod fetcher;
mod types;

pub use cache::{CacheStats, CatalogCache};
pub use fetcher::CatalogFetcher;
pub use types::{ChannelCatalog, EmoteRecord, RegistryEmote, image_url_for};
