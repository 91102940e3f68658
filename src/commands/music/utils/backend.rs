//! The seam between the player logic and the audio node that actually streams audio.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::time::Duration;

use super::filters::FilterSettings;
use super::music_manager::MusicResult;
use super::queue_manager::{EndReason, Track};

/// Voice server details the audio node needs to open the guild's voice connection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoiceConnection {
    pub endpoint: String,
    pub token: String,
    pub session_id: String,
    pub channel_id: Option<ChannelId>,
}

/// What the audio node reports about a guild's player.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub track: Option<Track>,
    pub position: Duration,
    pub paused: bool,
    pub volume: u16,
    pub connected: bool,
}

/// Track lifecycle events coming back from the audio node.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackStart {
        guild_id: GuildId,
        track: Track,
    },
    TrackEnd {
        guild_id: GuildId,
        track: Track,
        reason: EndReason,
    },
    TrackException {
        guild_id: GuildId,
        track: Track,
        message: String,
        severity: String,
    },
}

impl PlayerEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            PlayerEvent::TrackStart { guild_id, .. }
            | PlayerEvent::TrackEnd { guild_id, .. }
            | PlayerEvent::TrackException { guild_id, .. } => *guild_id,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Creates (or replaces) the guild's player on a node.
    async fn connect(&self, guild_id: GuildId, connection: VoiceConnection) -> MusicResult<()>;

    /// Tears the guild's player down on the node.
    async fn destroy(&self, guild_id: GuildId) -> MusicResult<()>;

    fn has_player(&self, guild_id: GuildId) -> bool;

    /// Whether the node serving the guild is up.
    async fn node_connected(&self, guild_id: GuildId) -> bool;

    /// Fetches the player from the node. `Ok(None)` means the node has no player.
    async fn player_state(&self, guild_id: GuildId) -> MusicResult<Option<PlayerSnapshot>>;

    async fn play(&self, guild_id: GuildId, track: &Track) -> MusicResult<()>;

    async fn stop(&self, guild_id: GuildId) -> MusicResult<()>;

    async fn set_paused(&self, guild_id: GuildId, paused: bool) -> MusicResult<()>;

    async fn set_volume(&self, guild_id: GuildId, volume: u16) -> MusicResult<()>;

    async fn seek(&self, guild_id: GuildId, position: Duration) -> MusicResult<()>;

    async fn set_filters(&self, guild_id: GuildId, filters: &FilterSettings) -> MusicResult<()>;
}
