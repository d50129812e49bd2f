use crate::catalog::{CatalogFetcher, RegistryEmote};
use crate::config::RegistryConfig;
use crate::error::{EmoteTrackerError, Result};
use crate::registry::types::UserConnection;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// HTTP client for the 7TV v3 REST API
pub struct SevenTvClient {
    http: reqwest::Client,
    api_base: String,
}

impl SevenTvClient {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("emote-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn user_url(&self, twitch_id: &str) -> String {
        format!("{}/users/twitch/{}", self.api_base, twitch_id)
    }
}

#[async_trait]
impl CatalogFetcher for SevenTvClient {
    async fn fetch_emotes(&self, twitch_id: &str) -> Result<Vec<RegistryEmote>> {
        let response = self.http.get(self.user_url(twitch_id)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(EmoteTrackerError::CatalogNotFound(twitch_id.to_string()));
            }
            status if !status.is_success() => {
                return Err(EmoteTrackerError::Registry(format!(
                    "GET users/twitch/{} returned {}",
                    twitch_id, status
                )));
            }
            _ => {}
        }

        let connection: UserConnection = response.json().await?;

        // a linked account without an active set has no catalog either
        let set = connection
            .emote_set
            .ok_or_else(|| EmoteTrackerError::CatalogNotFound(twitch_id.to_string()))?;

        tracing::debug!(
            twitch_id = %twitch_id,
            emote_set = %set.id,
            emotes = set.emotes.len(),
            "Received emote set from 7TV"
        );

        Ok(set.emotes.into_iter().map(RegistryEmote::from).collect())
    }
}
