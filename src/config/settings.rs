use crate::error::{EmoteTrackerError, Result};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

static LOGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{1,25}$").expect("valid login regex"));

#[derive(Debug, Clone)]
pub struct Settings {
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub channels: Vec<TrackedChannel>,
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub api_base: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_path: PathBuf,
    pub autosave_interval_secs: u64,
}

impl StorageConfig {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }
}

/// A chat channel we track, with the stable Twitch id the registry is keyed by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedChannel {
    /// Chat login, lowercase, without `#`
    pub login: String,
    pub twitch_id: String,
}

impl TrackedChannel {
    pub fn new(login: impl Into<String>, twitch_id: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            twitch_id: twitch_id.into(),
        }
    }
}

pub fn load_settings() -> Result<Settings> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let registry = RegistryConfig {
        api_base: std::env::var("SEVENTV_API_BASE")
            .unwrap_or_else(|_| "https://7tv.io/v3".to_string()),
        timeout_secs: parse_var("REGISTRY_TIMEOUT_SECS", 10)?,
    };

    let cache = CacheConfig {
        ttl_secs: parse_var("CATALOG_TTL_SECS", 300)?,
    };

    let storage = StorageConfig {
        data_path: std::env::var("DATA_PATH")
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                format!("{}/.emote_tracker/usage.json", home)
            })
            .into(),
        autosave_interval_secs: parse_var("AUTOSAVE_INTERVAL_SECS", 30)?,
    };
    if storage.autosave_interval_secs == 0 {
        return Err(EmoteTrackerError::Config(
            "AUTOSAVE_INTERVAL_SECS must be greater than zero".to_string(),
        ));
    }

    let channels = parse_channels(
        &std::env::var("TRACKED_CHANNELS")
            .map_err(|_| EmoteTrackerError::Config("TRACKED_CHANNELS not set".to_string()))?,
    )?;

    let log_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    Ok(Settings {
        registry,
        cache,
        storage,
        channels,
        log_json,
    })
}

fn parse_var(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| EmoteTrackerError::Config(format!("Invalid {}", name))),
        Err(_) => Ok(default),
    }
}

/// Parse `login:twitch_id` pairs separated by commas
pub fn parse_channels(raw: &str) -> Result<Vec<TrackedChannel>> {
    let mut channels: Vec<TrackedChannel> = Vec::new();

    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (login, id) = pair.split_once(':').ok_or_else(|| {
            EmoteTrackerError::Config(format!("Expected login:twitch_id, got '{}'", pair))
        })?;

        let login = login.trim().trim_start_matches('#').to_lowercase();
        let id = id.trim();

        if !LOGIN_RE.is_match(&login) {
            return Err(EmoteTrackerError::Config(format!(
                "Invalid channel login '{}'",
                login
            )));
        }
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(EmoteTrackerError::Config(format!(
                "Invalid twitch id '{}' for channel {}",
                id, login
            )));
        }
        if channels.iter().any(|c| c.login == login) {
            tracing::warn!(channel = %login, "Duplicate tracked channel ignored");
            continue;
        }

        channels.push(TrackedChannel::new(login, id));
    }

    if channels.is_empty() {
        return Err(EmoteTrackerError::Config(
            "TRACKED_CHANNELS contains no channels".to_string(),
        ));
    }

    Ok(channels)
}
