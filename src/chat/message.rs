use crate::error::{EmoteTrackerError, Result};
use std::collections::HashMap;

/// A chat badge such as `subscriber/12`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub name: String,
    pub version: String,
}

/// Who sent a message; every field has a defined default
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSender {
    /// Lowercase login, empty when the line had no source
    pub login: String,
    pub display_name: Option<String>,
    pub badges: Vec<Badge>,
    pub is_moderator: bool,
    pub is_subscriber: bool,
}

impl ChatSender {
    pub fn has_badge(&self, name: &str) -> bool {
        self.badges.iter().any(|b| b.name == name)
    }

    pub fn best_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.login)
    }
}

/// A chat message in a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Channel login without `#`
    pub channel: String,
    pub text: String,
    pub sender: ChatSender,
}

impl ChatMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            sender: ChatSender::default(),
        }
    }

    /// Parse one raw Twitch IRC line
    ///
    /// Returns `Ok(None)` for anything that is not a `PRIVMSG` (PING, JOIN,
    /// USERNOTICE, ...).
    pub fn parse_irc(line: &str) -> Result<Option<Self>> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let mut tags = HashMap::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, after) = stripped.split_once(' ').ok_or_else(|| {
                EmoteTrackerError::Parse(format!("tags without command: {}", line))
            })?;
            tags = parse_tags(raw_tags);
            rest = after.trim_start();
        }

        let mut nick = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (source, after) = stripped.split_once(' ').unwrap_or((stripped, ""));
            nick = source.split('!').next().map(str::to_lowercase);
            rest = after.trim_start();
        }

        let (command, params) = rest.split_once(' ').unwrap_or((rest, ""));
        if !command.eq_ignore_ascii_case("PRIVMSG") {
            return Ok(None);
        }

        let (target, trailing) = params.trim_start().split_once(' ').ok_or_else(|| {
            EmoteTrackerError::Parse(format!("PRIVMSG without text: {}", line))
        })?;
        let channel = target
            .strip_prefix('#')
            .ok_or_else(|| {
                EmoteTrackerError::Parse(format!("PRIVMSG target is not a channel: {}", target))
            })?
            .to_lowercase();
        let text = trailing.trim_start();
        let text = text.strip_prefix(':').unwrap_or(text);

        Ok(Some(Self {
            channel,
            text: strip_action(text).to_string(),
            sender: sender_from_tags(nick.unwrap_or_default(), &tags),
        }))
    }
}

fn parse_tags(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter(|t| !t.is_empty())
        .map(|tag| match tag.split_once('=') {
            Some((key, value)) => (key.to_string(), unescape_tag(value)),
            None => (tag.to_string(), String::new()),
        })
        .collect()
}

fn unescape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some(':') => out.push(';'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// `/me` messages arrive wrapped as `\x01ACTION ...\x01`
fn strip_action(text: &str) -> &str {
    text.strip_prefix("\u{1}ACTION ")
        .map(|t| t.strip_suffix('\u{1}').unwrap_or(t))
        .unwrap_or(text)
}

fn sender_from_tags(nick: String, tags: &HashMap<String, String>) -> ChatSender {
    let badges: Vec<Badge> = tags
        .get("badges")
        .map(|raw| {
            raw.split(',')
                .filter_map(|b| b.split_once('/'))
                .map(|(name, version)| Badge {
                    name: name.to_string(),
                    version: version.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let flag = |key: &str| tags.get(key).is_some_and(|v| v == "1");
    let has = |name: &str| badges.iter().any(|b| b.name == name);

    let is_moderator = flag("mod") || has("moderator") || has("broadcaster");
    let is_subscriber = flag("subscriber") || has("subscriber") || has("founder");

    ChatSender {
        login: nick,
        display_name: tags
            .get("display-name")
            .filter(|name| !name.is_empty())
            .cloned(),
        is_moderator,
        is_subscriber,
        badges,
    }
}
