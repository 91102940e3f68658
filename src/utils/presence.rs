//! Bot presence (online status + activity) and how it is applied to the gateway.

use serenity::all::{ActivityData, Context as SerenityContext, OnlineStatus};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, poise::ChoiceParameter)]
pub enum PresenceStatus {
    #[default]
    #[name = "online"]
    Online,
    #[name = "idle"]
    Idle,
    #[name = "dnd"]
    Dnd,
    #[name = "invisible"]
    Invisible,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Invisible => "invisible",
        }
    }

    pub fn to_online_status(self) -> OnlineStatus {
        match self {
            Self::Online => OnlineStatus::Online,
            Self::Idle => OnlineStatus::Idle,
            Self::Dnd => OnlineStatus::DoNotDisturb,
            Self::Invisible => OnlineStatus::Invisible,
        }
    }

    /// Parses a stored or typed status name.
    pub fn parse(s: &str) -> Result<Self, PresenceError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "idle" => Ok(Self::Idle),
            "dnd" => Ok(Self::Dnd),
            "invisible" => Ok(Self::Invisible),
            other => Err(PresenceError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum ActivityKind {
    #[name = "playing"]
    Playing,
    #[name = "listening"]
    Listening,
    #[name = "watching"]
    Watching,
    #[name = "competing"]
    Competing,
    #[name = "streaming"]
    Streaming,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Listening => "listening",
            Self::Watching => "watching",
            Self::Competing => "competing",
            Self::Streaming => "streaming",
        }
    }

    pub fn parse(s: &str) -> Result<Self, PresenceError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "playing" => Ok(Self::Playing),
            "listening" => Ok(Self::Listening),
            "watching" => Ok(Self::Watching),
            "competing" => Ok(Self::Competing),
            "streaming" => Ok(Self::Streaming),
            other => Err(PresenceError::UnknownActivity(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceActivity {
    pub kind: ActivityKind,
    pub message: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BotPresence {
    pub status: PresenceStatus,
    pub activity: Option<PresenceActivity>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PresenceError {
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
    #[error("Unknown activity type: {0}")]
    UnknownActivity(String),
    #[error("An activity needs a message")]
    MessageRequired,
    #[error("Streaming needs a message")]
    StreamingMessageRequired,
    #[error("Streaming needs an http(s) url")]
    StreamingUrl,
}

/// Validates and builds an activity from command input.
pub fn build_activity(
    kind: ActivityKind,
    message: Option<String>,
    url: Option<String>,
) -> Result<PresenceActivity, PresenceError> {
    let message = message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());

    if kind == ActivityKind::Streaming {
        let message = message.ok_or(PresenceError::StreamingMessageRequired)?;
        let url = url
            .map(|u| u.trim().to_string())
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .ok_or(PresenceError::StreamingUrl)?;
        return Ok(PresenceActivity {
            kind,
            message,
            url: Some(url),
        });
    }

    Ok(PresenceActivity {
        kind,
        message: message.ok_or(PresenceError::MessageRequired)?,
        url: None,
    })
}

fn activity_data(activity: &PresenceActivity) -> Option<ActivityData> {
    let name = activity.message.clone();
    match activity.kind {
        ActivityKind::Playing => Some(ActivityData::playing(name)),
        ActivityKind::Listening => Some(ActivityData::listening(name)),
        ActivityKind::Watching => Some(ActivityData::watching(name)),
        ActivityKind::Competing => Some(ActivityData::competing(name)),
        ActivityKind::Streaming => {
            let url = activity.url.as_deref().unwrap_or_default();
            match ActivityData::streaming(name, url) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("Invalid streaming url {:?}: {}", url, e);
                    None
                }
            }
        }
    }
}

/// Pushes the presence to the gateway.
pub fn apply_presence(ctx: &SerenityContext, presence: &BotPresence) {
    let activity = presence.activity.as_ref().and_then(activity_data);
    ctx.set_presence(activity, presence.status.to_online_status());
    info!(
        "Applied presence: status={} activity={:?}",
        presence.status.as_str(),
        presence.activity.as_ref().map(|a| (a.kind.as_str(), a.message.as_str()))
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    #[test_case("online", PresenceStatus::Online)]
    #[test_case("IDLE", PresenceStatus::Idle)]
    #[test_case(" dnd ", PresenceStatus::Dnd)]
    #[test_case("invisible", PresenceStatus::Invisible)]
    fn status_parsing(raw: &str, expected: PresenceStatus) {
        assert_eq!(PresenceStatus::parse(raw).unwrap(), expected);
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_matches!(
            PresenceStatus::parse("away"),
            Err(PresenceError::UnknownStatus(_))
        );
    }

    #[test]
    fn activity_requires_message() {
        assert_eq!(
            build_activity(ActivityKind::Playing, Some("   ".into()), None),
            Err(PresenceError::MessageRequired)
        );
    }

    #[test]
    fn streaming_requires_http_url() {
        assert_eq!(
            build_activity(
                ActivityKind::Streaming,
                Some("live".into()),
                Some("ftp://x".into())
            ),
            Err(PresenceError::StreamingUrl)
        );
        assert_eq!(
            build_activity(ActivityKind::Streaming, None, Some("https://x".into())),
            Err(PresenceError::StreamingMessageRequired)
        );
    }

    #[test]
    fn url_is_dropped_for_non_streaming() {
        let activity = build_activity(
            ActivityKind::Listening,
            Some("lofi".into()),
            Some("https://example.com".into()),
        )
        .unwrap();
        assert_eq!(activity.url, None);
        assert_eq!(activity.message, "lofi");
    }
}
