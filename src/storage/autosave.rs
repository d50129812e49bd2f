use crate::error::{EmoteTrackerError, Result};
use crate::storage::UsagePersistence;
use crate::usage::UsageStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveOutcome {
    Saved,
    /// Nothing changed since the last save
    Clean,
    Failed,
}

/// Periodically writes the usage store when it is dirty
pub struct Autosave {
    store: Arc<UsageStore>,
    persistence: Arc<UsagePersistence>,
    interval: Duration,
}

impl Autosave {
    pub fn new(
        store: Arc<UsageStore>,
        persistence: Arc<UsagePersistence>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            persistence,
            interval,
        }
    }

    /// Save if dirty, otherwise do nothing
    pub async fn tick(&self) -> AutosaveOutcome {
        if !self.store.is_dirty().await {
            tracing::trace!("Usage store clean, skipping save");
            return AutosaveOutcome::Clean;
        }

        match self.persistence.save(&self.store).await {
            Ok(()) => AutosaveOutcome::Saved,
            Err(_) => AutosaveOutcome::Failed,
        }
    }

    /// Run the loop in the background until `cancel` fires
    ///
    /// After cancellation the timer is dropped and one final save runs if the
    /// store is dirty. Await `AutosaveHandle::shutdown` to wait for it.
    pub fn spawn(self, cancel: CancellationToken) -> AutosaveHandle {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            path = %self.persistence.path().display(),
            "Starting autosave"
        );

        let task = tokio::spawn(self.run(cancel.clone()));
        AutosaveHandle { cancel, task }
    }

    async fn run(self, cancel: CancellationToken) -> AutosaveOutcome {
        let mut interval =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if self.tick().await == AutosaveOutcome::Failed {
                        tracing::warn!("Autosave failed, will retry on next tick");
                    }
                }
            }
        }

        drop(interval);
        tracing::info!("Autosave stopped, flushing usage data");

        let outcome = self.tick().await;
        match outcome {
            AutosaveOutcome::Saved => tracing::info!("Final flush complete"),
            AutosaveOutcome::Clean => tracing::info!("Nothing to flush"),
            AutosaveOutcome::Failed => {
                tracing::error!("Final flush failed, recent usage was not saved")
            }
        }
        outcome
    }
}

pub struct AutosaveHandle {
    cancel: CancellationToken,
    task: JoinHandle<AutosaveOutcome>,
}

impl AutosaveHandle {
    /// Stop the timer, wait for the final flush and report its outcome
    pub async fn shutdown(self) -> Result<AutosaveOutcome> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| EmoteTrackerError::Internal(format!("autosave task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn autosave(dir: &TempDir, interval: Duration) -> (Arc<UsageStore>, Autosave) {
        let store = Arc::new(UsageStore::new());
        let persistence = Arc::new(UsagePersistence::new(dir.path().join("usage.json")));
        let autosave = Autosave::new(store.clone(), persistence, interval);
        (store, autosave)
    }

    #[tokio::test]
    async fn test_idle_tick_does_not_write() {
        let dir = TempDir::new().unwrap();
        let (store, autosave) = autosave(&dir, Duration::from_secs(30));

        store.record_message("foo").await;

        assert_eq!(autosave.tick().await, AutosaveOutcome::Saved);
        assert_eq!(autosave.tick().await, AutosaveOutcome::Clean);

        store.record_message("foo").await;
        assert_eq!(autosave.tick().await, AutosaveOutcome::Saved);
    }

    #[tokio::test]
    async fn test_clean_store_never_creates_file() {
        let dir = TempDir::new().unwrap();
        let (_store, autosave) = autosave(&dir, Duration::from_secs(30));

        assert_eq!(autosave.tick().await, AutosaveOutcome::Clean);
        assert!(!dir.path().join("usage.json").exists());
    }

    #[tokio::test]
    async fn test_loop_saves_dirty_store() {
        let dir = TempDir::new().unwrap();
        let (store, autosave) = autosave(&dir, Duration::from_millis(20));
        store.record_message("foo").await;

        let handle = autosave.spawn(CancellationToken::new());

        for _ in 0..100 {
            if !store.is_dirty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!store.is_dirty().await);
        assert!(dir.path().join("usage.json").exists());

        assert_eq!(handle.shutdown().await.unwrap(), AutosaveOutcome::Clean);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_changes() {
        let dir = TempDir::new().unwrap();
        let (store, autosave) = autosave(&dir, Duration::from_secs(3600));

        let handle = autosave.spawn(CancellationToken::new());
        store.record_message("foo").await;

        assert_eq!(handle.shutdown().await.unwrap(), AutosaveOutcome::Saved);
        assert!(!store.is_dirty().await);

        let restored = UsageStore::new();
        UsagePersistence::new(dir.path().join("usage.json"))
            .load(&restored)
            .await
            .unwrap();
        assert_eq!(
            restored.channel_usage("foo").await.unwrap().total_messages,
            1
        );
    }

    #[tokio::test]
    async fn test_parent_cancellation_stops_loop() {
        let dir = TempDir::new().unwrap();
        let (_store, autosave) = autosave(&dir, Duration::from_secs(3600));
        let root = CancellationToken::new();

        let handle = autosave.spawn(root.child_token());
        root.cancel();

        assert_eq!(handle.shutdown().await.unwrap(), AutosaveOutcome::Clean);
    }
}
