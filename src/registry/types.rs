use crate::catalog::RegistryEmote;
use serde::Deserialize;

/// `GET /users/twitch/{id}` response, trimmed to what we read
#[derive(Debug, Deserialize)]
pub struct UserConnection {
    #[serde(default)]
    pub emote_set: Option<EmoteSet>,
}

#[derive(Debug, Deserialize)]
pub struct EmoteSet {
    pub id: String,
    #[serde(default)]
    pub emotes: Vec<ActiveEmote>,
}

/// An emote enabled in a set. `name` is the alias the channel uses in chat.
#[derive(Debug, Deserialize)]
pub struct ActiveEmote {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: Option<EmoteData>,
}

#[derive(Debug, Deserialize)]
pub struct EmoteData {
    #[serde(default)]
    pub animated: bool,
}

impl From<ActiveEmote> for RegistryEmote {
    fn from(emote: ActiveEmote) -> Self {
        Self {
            animated: emote.data.map(|d| d.animated).unwrap_or(false),
            id: emote.id,
            name: emote.name,
        }
    }
}
