use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmoteTrackerError {
    #[error("No emote catalog for channel: {0}")]
    CatalogNotFound(String),

    #[error("Emote registry error: {0}")]
    Registry(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to persist usage data: {0}")]
    PersistWrite(String),

    #[error("Persisted usage data is malformed: {0}")]
    PersistCorrupt(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chat message parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EmoteTrackerError {
    /// Whether the registry told us the channel has no catalog at all,
    /// as opposed to a failure worth retrying.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CatalogNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, EmoteTrackerError>;
