//! TTL cache of channel emote catalogs

use crate::catalog::{CatalogFetcher, ChannelCatalog, EmoteRecord};
use crate::config::TrackedChannel;
use crate::logging::Timer;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses served by a refresh another task finished while we waited
    pub collapsed: u64,
    pub fetches: u64,
    pub not_found: u64,
    pub fetch_errors: u64,
}

/// Per-channel emote catalogs, refreshed from the registry at most once per TTL
pub struct CatalogCache {
    fetcher: Arc<dyn CatalogFetcher>,

    /// Current catalog per channel login
    catalogs: DashMap<String, Arc<ChannelCatalog>>,

    /// One refresh in flight per channel
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,

    ttl: Duration,

    stats: RwLock<CacheStats>,
}

impl CatalogCache {
    /// Create a cache with the default 5 minute TTL
    pub fn new(fetcher: Arc<dyn CatalogFetcher>) -> Self {
        Self::with_ttl(fetcher, Duration::from_secs(300))
    }

    pub fn with_ttl(fetcher: Arc<dyn CatalogFetcher>, ttl: Duration) -> Self {
        tracing::info!(ttl_secs = ttl.as_secs(), "Creating catalog cache");

        Self {
            fetcher,
            catalogs: DashMap::new(),
            refresh_locks: DashMap::new(),
            ttl,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Get the channel's catalog, fetching it if absent or older than the TTL
    ///
    /// Never fails: a transient registry error yields an empty catalog for this
    /// call only and keeps whatever was cached before.
    pub async fn get_or_fetch(&self, channel: &TrackedChannel) -> Arc<ChannelCatalog> {
        if let Some(catalog) = self.fresh(&channel.login) {
            self.stats.write().await.hits += 1;
            tracing::trace!(channel = %channel.login, emotes = catalog.len(), "Catalog cache hit");
            return catalog;
        }

        self.stats.write().await.misses += 1;

        let lock = self
            .refresh_locks
            .entry(channel.login.clone())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        if let Some(catalog) = self.fresh(&channel.login) {
            self.stats.write().await.collapsed += 1;
            tracing::debug!(channel = %channel.login, "Catalog refreshed by concurrent request");
            return catalog;
        }

        self.refresh(channel).await
    }

    async fn refresh(&self, channel: &TrackedChannel) -> Arc<ChannelCatalog> {
        let _timer = Timer::new("catalog_fetch").for_channel(&channel.login);
        self.stats.write().await.fetches += 1;

        tracing::debug!(
            channel = %channel.login,
            twitch_id = %channel.twitch_id,
            "Fetching emote catalog from registry"
        );

        match self.fetcher.fetch_emotes(&channel.twitch_id).await {
            Ok(emotes) => {
                let catalog = Arc::new(ChannelCatalog::from_registry(&channel.login, emotes));
                tracing::info!(
                    channel = %channel.login,
                    emotes = catalog.len(),
                    "Fetched and cached emote catalog"
                );
                self.catalogs.insert(channel.login.clone(), catalog.clone());
                catalog
            }
            Err(e) if e.is_not_found() => {
                self.stats.write().await.not_found += 1;
                tracing::info!(
                    channel = %channel.login,
                    "Channel has no emote catalog, caching empty set"
                );
                let catalog = Arc::new(ChannelCatalog::empty(&channel.login));
                self.catalogs.insert(channel.login.clone(), catalog.clone());
                catalog
            }
            Err(e) => {
                self.stats.write().await.fetch_errors += 1;
                tracing::warn!(
                    channel = %channel.login,
                    error = %e,
                    "Failed to fetch emote catalog, using empty set until next attempt"
                );
                Arc::new(ChannelCatalog::empty(&channel.login))
            }
        }
    }

    /// Fetch catalogs for every channel concurrently
    ///
    /// Each channel settles on its own; a failing channel resolves to an empty
    /// catalog without affecting the others. Returns early if `cancel` fires.
    pub async fn preload(&self, channels: &[TrackedChannel], cancel: &CancellationToken) {
        tracing::info!(channels = channels.len(), "Preloading emote catalogs");

        let loads = channels.iter().map(|channel| async move {
            let catalog = self.get_or_fetch(channel).await;
            (channel.login.as_str(), catalog.len())
        });

        tokio::select! {
            results = join_all(loads) => {
                let mut total_emotes = 0;
                for (channel, emotes) in &results {
                    tracing::debug!(channel = %channel, emotes = emotes, "Catalog preloaded");
                    total_emotes += emotes;
                }
                tracing::info!(
                    channels = results.len(),
                    emotes = total_emotes,
                    "Catalog preload complete"
                );
            }
            _ = cancel.cancelled() => {
                tracing::warn!("Catalog preload cancelled");
            }
        }
    }

    /// All emotes currently cached for a channel, sorted by name. Never fetches.
    pub fn all_entries(&self, channel: &str) -> Vec<EmoteRecord> {
        let mut entries: Vec<EmoteRecord> = self
            .catalogs
            .get(channel)
            .map(|catalog| catalog.entries.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Cached catalog regardless of age
    pub fn cached(&self, channel: &str) -> Option<Arc<ChannelCatalog>> {
        self.catalogs.get(channel).map(|c| c.clone())
    }

    fn fresh(&self, channel: &str) -> Option<Arc<ChannelCatalog>> {
        let catalog = self.catalogs.get(channel)?;
        if catalog.is_fresh(self.ttl) {
            Some(catalog.clone())
        } else {
            tracing::debug!(
                channel = %channel,
                age_secs = catalog.fetched_at.elapsed().as_secs(),
                "Catalog cache entry stale"
            );
            None
        }
    }

    pub async fn get_stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    pub fn cache_size(&self) -> usize {
        self.catalogs.len()
    }

    /// Log cache statistics (for periodic monitoring)
    pub async fn log_stats(&self) {
        let stats = self.get_stats().await;

        let hit_rate = if stats.hits + stats.misses > 0 {
            (stats.hits as f32 / (stats.hits + stats.misses) as f32 * 100.0) as u32
        } else {
            0
        };

        tracing::info!(
            channels_cached = self.cache_size(),
            hit_rate = hit_rate,
            fetches = stats.fetches,
            collapsed = stats.collapsed,
            not_found = stats.not_found,
            fetch_errors = stats.fetch_errors,
            "Catalog cache statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RegistryEmote;
    use crate::error::{EmoteTrackerError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Reply {
        Emotes(Vec<&'static str>),
        NotFound,
        Fail,
    }

    struct FakeFetcher {
        calls: AtomicUsize,
        reply: std::sync::Mutex<Reply>,
        delay: Option<Duration>,
    }

    impl FakeFetcher {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: std::sync::Mutex::new(reply),
                delay: None,
            })
        }

        fn slow(reply: Reply, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: std::sync::Mutex::new(reply),
                delay: Some(delay),
            })
        }

        fn set_reply(&self, reply: Reply) {
            *self.reply.lock().unwrap() = reply;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogFetcher for FakeFetcher {
        async fn fetch_emotes(&self, twitch_id: &str) -> Result<Vec<RegistryEmote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let reply = self.reply.lock().unwrap().clone();
            match reply {
                Reply::Emotes(names) => Ok(names
                    .into_iter()
                    .enumerate()
                    .map(|(i, name)| RegistryEmote {
                        id: format!("{}-{}", twitch_id, i),
                        name: name.to_string(),
                        animated: false,
                    })
                    .collect()),
                Reply::NotFound => Err(EmoteTrackerError::CatalogNotFound(twitch_id.to_string())),
                Reply::Fail => Err(EmoteTrackerError::Registry("502 Bad Gateway".to_string())),
            }
        }
    }

    fn foo() -> TrackedChannel {
        TrackedChannel::new("foo", "1001")
    }

    #[tokio::test]
    async fn test_second_lookup_within_ttl_is_cached() {
        let fetcher = FakeFetcher::new(Reply::Emotes(vec!["peepoArrive", "Kappa"]));
        let cache = CatalogCache::new(fetcher.clone());

        let first = cache.get_or_fetch(&foo()).await;
        let second = cache.get_or_fetch(&foo()).await;

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.get_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let fetcher = FakeFetcher::new(Reply::Emotes(vec!["Kappa"]));
        let cache = CatalogCache::new(fetcher.clone());

        cache.get_or_fetch(&foo()).await;
        tokio::time::advance(Duration::from_secs(299)).await;
        cache.get_or_fetch(&foo()).await;
        assert_eq!(fetcher.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        fetcher.set_reply(Reply::Emotes(vec!["Kappa", "OMEGALUL"]));
        let refreshed = cache.get_or_fetch(&foo()).await;

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(refreshed.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_cached_for_full_ttl() {
        let fetcher = FakeFetcher::new(Reply::NotFound);
        let cache = CatalogCache::new(fetcher.clone());

        let catalog = cache.get_or_fetch(&foo()).await;
        assert!(catalog.is_empty());

        tokio::time::advance(Duration::from_secs(120)).await;
        cache.get_or_fetch(&foo()).await;

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(cache.cache_size(), 1);
        assert_eq!(cache.get_stats().await.not_found, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_not_cached() {
        let fetcher = FakeFetcher::new(Reply::Fail);
        let cache = CatalogCache::new(fetcher.clone());

        assert!(cache.get_or_fetch(&foo()).await.is_empty());
        assert!(cache.get_or_fetch(&foo()).await.is_empty());
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(cache.cache_size(), 0);

        fetcher.set_reply(Reply::Emotes(vec!["Kappa"]));
        assert_eq!(cache.get_or_fetch(&foo()).await.len(), 1);
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_keeps_previous_entry() {
        let fetcher = FakeFetcher::new(Reply::Emotes(vec!["Kappa"]));
        let cache = CatalogCache::new(fetcher.clone());

        let original = cache.get_or_fetch(&foo()).await;
        tokio::time::advance(Duration::from_secs(301)).await;

        fetcher.set_reply(Reply::Fail);
        let during_outage = cache.get_or_fetch(&foo()).await;
        assert!(during_outage.is_empty());

        let kept = cache.cached("foo").unwrap();
        assert!(Arc::ptr_eq(&kept, &original));
        assert_eq!(cache.all_entries("foo").len(), 1);

        // still stale, so the next call retries
        cache.get_or_fetch(&foo()).await;
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_collapse() {
        let fetcher = FakeFetcher::slow(Reply::Emotes(vec!["Kappa"]), Duration::from_secs(2));
        let cache = CatalogCache::new(fetcher.clone());

        let channel = foo();
        let (a, b) = tokio::join!(cache.get_or_fetch(&channel), cache.get_or_fetch(&channel));

        assert_eq!(fetcher.calls(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.get_stats().await.collapsed, 1);
    }

    #[tokio::test]
    async fn test_preload_isolates_failures() {
        struct SplitFetcher;

        #[async_trait]
        impl CatalogFetcher for SplitFetcher {
            async fn fetch_emotes(&self, twitch_id: &str) -> Result<Vec<RegistryEmote>> {
                match twitch_id {
                    "1" => Ok(vec![RegistryEmote {
                        id: "a".to_string(),
                        name: "Kappa".to_string(),
                        animated: false,
                    }]),
                    "2" => Err(EmoteTrackerError::Registry("timeout".to_string())),
                    _ => Err(EmoteTrackerError::CatalogNotFound(twitch_id.to_string())),
                }
            }
        }

        let cache = CatalogCache::new(Arc::new(SplitFetcher));
        let channels = vec![
            TrackedChannel::new("ok", "1"),
            TrackedChannel::new("down", "2"),
            TrackedChannel::new("none", "3"),
        ];

        cache.preload(&channels, &CancellationToken::new()).await;

        assert_eq!(cache.all_entries("ok").len(), 1);
        assert!(cache.cached("down").is_none());
        assert!(cache.cached("none").is_some());
        assert_eq!(cache.cache_size(), 2);
    }

    #[tokio::test]
    async fn test_preload_stops_when_cancelled() {
        let fetcher = FakeFetcher::slow(Reply::Emotes(vec!["Kappa"]), Duration::from_secs(3600));
        let cache = CatalogCache::new(fetcher.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        cache.preload(&[foo()], &cancel).await;

        assert_eq!(cache.cache_size(), 0);
    }

    #[test]
    fn test_all_entries_sorted_and_empty_for_unknown() {
        let fetcher = FakeFetcher::new(Reply::Emotes(vec!["peepoArrive", "Kappa", "EZ"]));
        let cache = CatalogCache::new(fetcher);

        tokio_test::block_on(cache.get_or_fetch(&foo()));

        let names: Vec<_> = cache
            .all_entries("foo")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["EZ", "Kappa", "peepoArrive"]);
        assert!(cache.all_entries("bar").is_empty());
    }
}
