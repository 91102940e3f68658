use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{debug, warn};

use super::backend::VoiceConnection;
use super::music_manager::{MusicError, MusicResult};

/// Joining and leaving voice channels on the Discord side.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Joins (or moves to) `channel_id` and returns the voice server details.
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<VoiceConnection>;

    async fn leave(&self, guild_id: GuildId) -> MusicResult<()>;

    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId>;

    async fn deafen(&self, guild_id: GuildId) -> MusicResult<()>;
}

/// Voice gateway handled by songbird without its audio driver.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<VoiceConnection> {
        debug!("Joining voice channel {} in guild {}", channel_id, guild_id);

        let (info, call) = self
            .manager
            .join_gateway(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))?;

        if let Err(e) = call.lock().await.deafen(true).await {
            warn!("Failed to self-deafen in guild {}: {}", guild_id, e);
        }

        Ok(VoiceConnection {
            endpoint: info.endpoint,
            token: info.token,
            session_id: info.session_id,
            channel_id: info.channel_id.map(|c| ChannelId::new(c.0.get())),
        })
    }

    async fn leave(&self, guild_id: GuildId) -> MusicResult<()> {
        if self.manager.get(guild_id).is_none() {
            return Ok(());
        }
        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))
    }

    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let call = self.manager.get(guild_id)?;
        let channel = call.lock().await.current_channel();
        channel.map(|c| ChannelId::new(c.0.get()))
    }

    async fn deafen(&self, guild_id: GuildId) -> MusicResult<()> {
        let call = self.manager.get(guild_id).ok_or(MusicError::NotConnected)?;
        let mut call = call.lock().await;
        if call.is_deaf() {
            return Ok(());
        }
        call.deafen(true)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))
    }
}
