use crate::error::{EmoteTrackerError, Result};
use crate::logging::{Timer, log_error};
use crate::storage::records::PersistedChannel;
use crate::usage::{ChannelUsage, UsageStore};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// What `load` found on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file yet; the store starts empty
    Fresh,
    Restored { channels: usize, emotes: usize },
}

/// Reads and writes the usage document at a single path
pub struct UsagePersistence {
    path: PathBuf,
}

impl UsagePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole store, then mark what was written as persisted
    ///
    /// On failure the store stays dirty so the next autosave retries.
    pub async fn save(&self, store: &UsageStore) -> Result<()> {
        let _timer = Timer::new("usage_save");
        let snapshot = store.snapshot().await;

        let records: Vec<PersistedChannel> = snapshot
            .channels
            .iter()
            .map(PersistedChannel::from)
            .collect();
        let body = serde_json::to_vec_pretty(&records)?;

        if let Err(e) = self.write_atomic(&body).await {
            let err = EmoteTrackerError::PersistWrite(format!("{}: {}", self.path.display(), e));
            log_error("usage_save", &err);
            return Err(err);
        }

        store.mark_persisted(snapshot.generation).await;
        tracing::info!(
            path = %self.path.display(),
            channels = records.len(),
            bytes = body.len(),
            "Saved usage data"
        );

        Ok(())
    }

    /// Fill the store from disk; a missing file is a fresh start
    ///
    /// A file that exists but does not parse is returned as
    /// `PersistCorrupt` and the store is left untouched.
    pub async fn load(&self, store: &UsageStore) -> Result<LoadOutcome> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "No saved usage data, starting empty"
                );
                return Ok(LoadOutcome::Fresh);
            }
            Err(e) => return Err(e.into()),
        };

        let records: Vec<PersistedChannel> = serde_json::from_slice(&raw).map_err(|e| {
            let err = EmoteTrackerError::PersistCorrupt(format!("{}: {}", self.path.display(), e));
            log_error("usage_load", &err);
            err
        })?;

        let channels: Vec<ChannelUsage> = records.into_iter().map(ChannelUsage::from).collect();
        let outcome = LoadOutcome::Restored {
            channels: channels.len(),
            emotes: channels.iter().map(|c| c.counters.len()).sum(),
        };
        store.restore(channels).await;

        tracing::info!(path = %self.path.display(), outcome = ?outcome, "Loaded usage data");
        Ok(outcome)
    }

    /// Write to a sibling temp file and rename it over the target
    async fn write_atomic(&self, body: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("usage.json");
        let tmp = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        let written = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(body).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &self.path).await
        }
        .await;

        if written.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::EmoteSnapshot;
    use tempfile::TempDir;

    async fn populated_store() -> UsageStore {
        let store = UsageStore::new();
        store.record_message("foo").await;
        store.record_message("foo").await;
        store
            .record_emote_usage(
                "foo",
                "peepoArrive",
                Some(EmoteSnapshot {
                    emote_id: "60ae958e229664e8667aea38".to_string(),
                    image_url: "https://cdn.7tv.app/emote/60ae958e229664e8667aea38/1x.webp"
                        .to_string(),
                    animated: true,
                }),
            )
            .await;
        store.record_emote_usage("foo", "Kappa", None).await;
        store.record_message("bar").await;
        store
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let persistence = UsagePersistence::new(dir.path().join("usage.json"));
        let store = populated_store().await;

        persistence.save(&store).await.unwrap();
        assert!(!store.is_dirty().await);

        let restored = UsageStore::new();
        let outcome = persistence.load(&restored).await.unwrap();

        assert_eq!(
            outcome,
            LoadOutcome::Restored {
                channels: 2,
                emotes: 2
            }
        );
        for channel in ["foo", "bar"] {
            assert_eq!(
                restored.channel_usage(channel).await,
                store.channel_usage(channel).await
            );
        }
        assert!(!restored.is_dirty().await);
    }

    #[tokio::test]
    async fn test_save_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state").join("usage.json");
        let persistence = UsagePersistence::new(&path);

        persistence.save(&populated_store().await).await.unwrap();

        assert!(path.exists());
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_fresh() {
        let dir = TempDir::new().unwrap();
        let persistence = UsagePersistence::new(dir.path().join("absent.json"));
        let store = UsageStore::new();

        assert_eq!(persistence.load(&store).await.unwrap(), LoadOutcome::Fresh);
        assert!(store.channels().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usage.json");
        std::fs::write(&path, b"{\"channelName\": ").unwrap();

        let store = UsageStore::new();
        store.record_message("live").await;
        let err = UsagePersistence::new(&path).load(&store).await.unwrap_err();

        assert!(matches!(err, EmoteTrackerError::PersistCorrupt(_)));
        assert!(store.channel_usage("live").await.is_some());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_store_dirty() {
        let dir = TempDir::new().unwrap();
        // a directory where the file should be makes the rename fail
        let path = dir.path().join("usage.json");
        std::fs::create_dir(&path).unwrap();

        let store = populated_store().await;
        let err = UsagePersistence::new(&path).save(&store).await.unwrap_err();

        assert!(matches!(err, EmoteTrackerError::PersistWrite(_)));
        assert!(store.is_dirty().await);
    }
}
