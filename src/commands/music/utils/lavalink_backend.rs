//! `AudioBackend` and `AudioNode` over lavalink-rs.
//!
//! Models are converted through their Lavalink JSON shape, which both sides share.

use async_trait::async_trait;
use lavalink_rs::client::LavalinkClient;
use lavalink_rs::model::events;
use lavalink_rs::model::http::UpdatePlayer;
use lavalink_rs::model::player::{ConnectionInfo, Filters, Player};
use lavalink_rs::model::track::TrackData;
use lavalink_rs::node::NodeBuilder;
use lavalink_rs::prelude::NodeDistributionStrategy;
use serde::{Serialize, de::DeserializeOwned};
use serenity::model::id::{GuildId, UserId};
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::backend::{AudioBackend, PlayerEvent, PlayerSnapshot, VoiceConnection};
use super::filters::FilterSettings;
use super::lavalink_rest::{LavalinkRest, LoadResult, WireTrack};
use super::music_manager::{MusicError, MusicResult, classify_backend_error};
use super::node_pool::AudioNode;
use super::queue_manager::{EndReason, Track};
use crate::config::NodeConfig;

/// Where lavalink hooks forward their events. Hooks are plain functions, so the
/// sender has to be reachable without state.
static EVENT_SINK: OnceLock<UnboundedSender<PlayerEvent>> = OnceLock::new();

fn emit(event: PlayerEvent) {
    match EVENT_SINK.get() {
        Some(sender) => {
            if sender.send(event).is_err() {
                warn!("Player event receiver is gone");
            }
        }
        None => debug!("Dropping player event, no receiver registered"),
    }
}

fn backend_error(e: impl std::fmt::Debug) -> MusicError {
    classify_backend_error(&format!("{:?}", e))
}

/// Re-reads a value through its JSON form.
fn convert<T: Serialize, U: DeserializeOwned>(value: &T) -> MusicResult<U> {
    serde_json::to_value(value)
        .and_then(serde_json::from_value)
        .map_err(|e| MusicError::Backend {
            status: None,
            message: format!("model conversion failed: {}", e),
        })
}

fn guild(id: lavalink_rs::model::GuildId) -> GuildId {
    GuildId::new(id.0)
}

fn lavalink_guild(id: GuildId) -> lavalink_rs::model::GuildId {
    lavalink_rs::model::GuildId(id.get())
}

fn track_from_data(data: &TrackData) -> Option<Track> {
    match convert::<_, WireTrack>(data) {
        Ok(wire) => Some(wire.into()),
        Err(e) => {
            warn!("Could not read track from lavalink: {}", e);
            None
        }
    }
}

#[lavalink_rs::hook]
async fn on_track_start(_client: LavalinkClient, _session_id: String, event: &events::TrackStart) {
    if let Some(track) = track_from_data(&event.track) {
        emit(PlayerEvent::TrackStart {
            guild_id: guild(event.guild_id),
            track,
        });
    }
}

#[lavalink_rs::hook]
async fn on_track_end(_client: LavalinkClient, _session_id: String, event: &events::TrackEnd) {
    let reason = serde_json::to_value(&event.reason)
        .ok()
        .and_then(|v| v.as_str().map(EndReason::from_wire))
        .unwrap_or(EndReason::Cleanup);

    if let Some(track) = track_from_data(&event.track) {
        emit(PlayerEvent::TrackEnd {
            guild_id: guild(event.guild_id),
            track,
            reason,
        });
    }
}

#[lavalink_rs::hook]
async fn on_track_exception(
    _client: LavalinkClient,
    _session_id: String,
    event: &events::TrackException,
) {
    let exception = serde_json::to_value(&event.exception).unwrap_or_default();
    let (message, severity) = exception_details(&exception);

    if let Some(track) = track_from_data(&event.track) {
        emit(PlayerEvent::TrackException {
            guild_id: guild(event.guild_id),
            track,
            message,
            severity,
        });
    }
}

/// Message and lowercased severity of a Lavalink exception. The cause is kept
/// next to the message since login errors often only show up there.
fn exception_details(exception: &serde_json::Value) -> (String, String) {
    let text = |key: &str| {
        exception[key]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let message = match (text("message"), text("cause")) {
        (Some(message), Some(cause)) if message != cause => format!("{} ({})", message, cause),
        (Some(message), _) => message.to_string(),
        (None, Some(cause)) => cause.to_string(),
        (None, None) => "unknown error".to_string(),
    };
    let severity = text("severity").unwrap_or("common").to_lowercase();
    (message, severity)
}

#[lavalink_rs::hook]
async fn on_ready(_client: LavalinkClient, session_id: String, _event: &events::Ready) {
    info!("Lavalink node ready, session {}", session_id);
}

/// Connects to every configured node and wires lavalink events into `events`.
pub async fn connect(
    nodes: &[NodeConfig],
    bot_id: UserId,
    http: reqwest::Client,
    events: UnboundedSender<PlayerEvent>,
) -> (Arc<LavalinkBackend>, Vec<Arc<dyn AudioNode>>) {
    if EVENT_SINK.set(events).is_err() {
        warn!("Player event receiver was already registered");
    }

    let hooks = events::Events {
        ready: Some(on_ready),
        track_start: Some(on_track_start),
        track_end: Some(on_track_end),
        track_exception: Some(on_track_exception),
        ..Default::default()
    };

    let builders = nodes
        .iter()
        .map(|node| NodeBuilder {
            hostname: node.address(),
            is_ssl: node.secure,
            events: events::Events::default(),
            password: node.password.clone(),
            user_id: lavalink_rs::model::UserId(bot_id.get()),
            session_id: None,
        })
        .collect();

    let client = LavalinkClient::new(hooks, builders, NodeDistributionStrategy::main_fallback()).await;

    let audio_nodes = nodes
        .iter()
        .enumerate()
        .map(|(index, config)| {
            Arc::new(LavalinkNode {
                client: client.clone(),
                index,
                config: config.clone(),
                rest: LavalinkRest::new(http.clone(), config),
            }) as Arc<dyn AudioNode>
        })
        .collect();

    (Arc::new(LavalinkBackend { client }), audio_nodes)
}

pub struct LavalinkBackend {
    client: LavalinkClient,
}

impl LavalinkBackend {
    fn player(&self, guild_id: GuildId) -> MusicResult<lavalink_rs::player_context::PlayerContext> {
        self.client
            .get_player_context(lavalink_guild(guild_id))
            .ok_or(MusicError::NoPlayer)
    }
}

fn connection_info(connection: VoiceConnection) -> ConnectionInfo {
    ConnectionInfo {
        endpoint: connection.endpoint,
        token: connection.token,
        session_id: connection.session_id,
    }
}

/// Player update that only swaps the voice session.
fn voice_update(info: ConnectionInfo) -> UpdatePlayer {
    UpdatePlayer {
        voice: Some(info),
        ..Default::default()
    }
}

fn snapshot(player: Player) -> PlayerSnapshot {
    PlayerSnapshot {
        track: player.track.as_ref().and_then(track_from_data),
        position: Duration::from_millis(player.state.position),
        paused: player.paused,
        volume: player.volume,
        connected: player.state.connected,
    }
}

#[async_trait]
impl AudioBackend for LavalinkBackend {
    async fn connect(&self, guild_id: GuildId, connection: VoiceConnection) -> MusicResult<()> {
        let info = connection_info(connection);

        // Creating over an existing context keeps the old voice session, so a
        // move has to push the new one onto the live player.
        if let Some(player) = self.client.get_player_context(lavalink_guild(guild_id)) {
            player
                .update_player(&voice_update(info), true)
                .await
                .map_err(backend_error)?;
            debug!("Sent new voice session to lavalink for guild {}", guild_id);
            return Ok(());
        }

        self.client
            .create_player_context(lavalink_guild(guild_id), info)
            .await
            .map_err(backend_error)?;
        debug!("Created lavalink player for guild {}", guild_id);
        Ok(())
    }

    async fn destroy(&self, guild_id: GuildId) -> MusicResult<()> {
        self.client
            .delete_player(lavalink_guild(guild_id))
            .await
            .map_err(backend_error)
    }

    fn has_player(&self, guild_id: GuildId) -> bool {
        self.client
            .get_player_context(lavalink_guild(guild_id))
            .is_some()
    }

    async fn node_connected(&self, guild_id: GuildId) -> bool {
        self.client
            .get_node_for_guild(lavalink_guild(guild_id))
            .await
            .is_running
            .load(Ordering::SeqCst)
    }

    async fn player_state(&self, guild_id: GuildId) -> MusicResult<Option<PlayerSnapshot>> {
        let Some(player) = self.client.get_player_context(lavalink_guild(guild_id)) else {
            return Ok(None);
        };
        let player = player.get_player().await.map_err(backend_error)?;
        Ok(Some(snapshot(player)))
    }

    async fn play(&self, guild_id: GuildId, track: &Track) -> MusicResult<()> {
        let data: TrackData = convert(&WireTrack::from(track))?;
        self.player(guild_id)?
            .play_now(&data)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> MusicResult<()> {
        self.player(guild_id)?
            .stop_now()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn set_paused(&self, guild_id: GuildId, paused: bool) -> MusicResult<()> {
        self.player(guild_id)?
            .set_pause(paused)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn set_volume(&self, guild_id: GuildId, volume: u16) -> MusicResult<()> {
        self.player(guild_id)?
            .set_volume(volume)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn seek(&self, guild_id: GuildId, position: Duration) -> MusicResult<()> {
        self.player(guild_id)?
            .set_position(position)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn set_filters(&self, guild_id: GuildId, filters: &FilterSettings) -> MusicResult<()> {
        let filters: Filters = convert(filters)?;
        self.player(guild_id)?
            .set_filters(filters)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

/// One configured node: websocket state from the lavalink client, REST calls over HTTP.
pub struct LavalinkNode {
    client: LavalinkClient,
    index: usize,
    config: NodeConfig,
    rest: LavalinkRest,
}

#[async_trait]
impl AudioNode for LavalinkNode {
    fn label(&self) -> String {
        self.config.name.clone()
    }

    fn config(&self) -> NodeConfig {
        self.config.clone()
    }

    fn is_connected(&self) -> bool {
        self.client
            .nodes
            .get(self.index)
            .is_some_and(|node| node.is_running.load(Ordering::SeqCst))
    }

    async fn reconnect(&self) -> MusicResult<()> {
        let node = self
            .client
            .nodes
            .get(self.index)
            .ok_or(MusicError::NoNodesAvailable)?;
        node.connect(self.client.clone()).await.map_err(|e| {
            error!("Node {} failed to connect: {:?}", self.config.name, e);
            backend_error(e)
        })
    }

    async fn load(&self, query: &str) -> MusicResult<LoadResult> {
        self.rest.load_tracks(query).await
    }

    async fn probe(&self) -> MusicResult<Duration> {
        self.rest.probe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::music::utils::fallback::needs_fallback;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn voice_update_only_carries_the_session() {
        let update = voice_update(connection_info(VoiceConnection {
            endpoint: "us-east.discord.media".into(),
            token: "new-token".into(),
            session_id: "new-session".into(),
            channel_id: None,
        }));

        let voice = update.voice.as_ref().unwrap();
        assert_eq!(voice.endpoint, "us-east.discord.media");
        assert_eq!(voice.token, "new-token");
        assert_eq!(voice.session_id, "new-session");
        assert!(update.track.is_none());
        assert!(update.paused.is_none());
        assert!(update.volume.is_none());
    }

    #[test]
    fn exception_cause_is_kept_with_the_message() {
        let exception = json!({
            "message": "Something broke when playing the track.",
            "severity": "SUSPICIOUS",
            "cause": "This video requires login"
        });
        let (message, severity) = exception_details(&exception);

        assert_eq!(
            message,
            "Something broke when playing the track. (This video requires login)"
        );
        assert_eq!(severity, "suspicious");
        assert!(needs_fallback(&message, &severity));
    }

    #[test]
    fn exception_without_details() {
        assert_eq!(
            exception_details(&json!({ "message": "", "cause": null })),
            ("unknown error".to_string(), "common".to_string())
        );
        assert_eq!(
            exception_details(&json!({ "message": "Same", "cause": "Same", "severity": "FAULT" })),
            ("Same".to_string(), "fault".to_string())
        );
    }
}
