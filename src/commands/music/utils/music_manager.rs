use regex::Regex;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::backend::{AudioBackend, PlayerSnapshot};
use super::fallback::{fallback_key, fallback_queries, needs_fallback, pick_replacement};
use super::filters::{BassBoostLevel, FilterPreset, FilterSettings, toggle_preset};
use super::node_pool::NodePool;
use super::queue_manager::{
    DEFAULT_VOLUME, EndAction, EndReason, GuildQueue, LoopMode, QueueSnapshot, Track,
    TrackFailure, end_action,
};
use super::voice_gateway::VoiceGateway;
use crate::utils::database::Database;

pub const MAX_VOLUME: u16 = 150;
const CONNECT_ATTEMPTS: usize = 2;
const RESTART_THRESHOLD: Duration = Duration::from_secs(10);
const SAVED_TRACK_DELAY: Duration = Duration::from_millis(150);

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("You must be in the same voice channel as the bot")]
    NotSameChannel,

    #[error("No active player for this guild")]
    NoPlayer,

    #[error("Nothing is playing")]
    NoTrack,

    #[error("No Lavalink node available")]
    NoNodesAvailable,

    #[error("Every Lavalink node failed: {}", .0.join("; "))]
    AllNodesFailed(Vec<String>),

    #[error("No results found")]
    NoResults,

    #[error("Lavalink error (status {status:?}): {message}")]
    Backend {
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Invalid position")]
    InvalidPosition,

    #[error("Value out of range")]
    OutOfRange,
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

static STATUS_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"status(?:\s*code)?\W{0,3}(\d{3})").expect("valid status regex"));
static BARE_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([45]\d{2})\b").expect("valid status regex"));

impl MusicError {
    pub fn status(&self) -> Option<u16> {
        match self {
            MusicError::Backend { status, .. } => *status,
            _ => None,
        }
    }

    fn message_mentions(&self, needle: &str) -> bool {
        match self {
            MusicError::Backend { message, .. } => message.to_lowercase().contains(needle),
            _ => false,
        }
    }

    /// A failed player fetch that means the node forgot about us.
    pub fn requires_rebuild_on_fetch(&self) -> bool {
        matches!(self.status(), Some(401 | 402 | 403 | 404 | 410))
            || self.message_mentions("session")
    }

    /// A failed play request worth one rebuild and retry.
    pub fn requires_rebuild_on_play(&self) -> bool {
        matches!(self.status(), Some(400 | 401 | 402 | 403 | 404 | 410))
            || self.message_mentions("session")
            || self.message_mentions("player not found")
    }

    /// Errors that mean the whole connection is unusable, not just the track.
    fn is_fatal(&self) -> bool {
        match self {
            MusicError::NoNodesAvailable
            | MusicError::AllNodesFailed(_)
            | MusicError::NotConnected
            | MusicError::NoPlayer
            | MusicError::JoinError(_) => true,
            MusicError::Backend { status, .. } => matches!(status, Some(s) if *s >= 500),
            _ => false,
        }
    }
}

/// Turns a client library error into [`MusicError::Backend`], pulling an HTTP status
/// out of its text when there is one.
pub fn classify_backend_error(text: &str) -> MusicError {
    let status = STATUS_FIELD
        .captures(text)
        .or_else(|| BARE_STATUS.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());

    MusicError::Backend {
        status,
        message: text.to_string(),
    }
}

/// What fetching the guild's player from the node turned up.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerProbe {
    Healthy,
    Missing,
    NodeDown,
    Failed(MusicError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPlan {
    Healthy,
    Connect,
    Move(ChannelId),
    Rebuild(String),
}

pub fn plan_reconnect(
    current: Option<ChannelId>,
    requested: ChannelId,
    probe: &PlayerProbe,
) -> ReconnectPlan {
    match current {
        None => return ReconnectPlan::Connect,
        Some(channel) if channel != requested => return ReconnectPlan::Move(requested),
        Some(_) => {}
    }

    match probe {
        PlayerProbe::Healthy => ReconnectPlan::Healthy,
        PlayerProbe::Missing => ReconnectPlan::Rebuild("player missing".to_string()),
        PlayerProbe::NodeDown => ReconnectPlan::Rebuild("node disconnected".to_string()),
        PlayerProbe::Failed(e) if e.requires_rebuild_on_fetch() => {
            ReconnectPlan::Rebuild(format!("player fetch failed: {}", e))
        }
        PlayerProbe::Failed(_) => ReconnectPlan::Healthy,
    }
}

/// Result of adding tracks through `/play` and friends.
#[derive(Debug, Clone, PartialEq)]
pub struct Enqueued {
    /// Set when the player was idle and the first track started right away.
    pub started: Option<Track>,
    /// 1-based queue position of the first added track (0 when it started).
    pub first_position: usize,
    pub added: usize,
    pub eta: Duration,
    pub queue_len: usize,
}

/// What the event layer should show after a track ended.
#[derive(Debug, Clone, PartialEq)]
pub enum EndOutcome {
    Ignored,
    Continued { next: Track, clear_message: bool },
    FellBack { failed: Track, replacement: Track },
    Failed {
        failed: Track,
        failure: TrackFailure,
        next: Option<Track>,
    },
    Finished { clear_message: bool },
}

/// A saved queue that was loaded back into a player.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredQueue {
    pub first: Option<Track>,
    pub restored: usize,
    pub skipped: usize,
    pub queue_len: usize,
}

/// Owns every guild's queue and keeps the audio node's players in line with it.
pub struct MusicManager {
    backend: Arc<dyn AudioBackend>,
    voice: Arc<dyn VoiceGateway>,
    nodes: Arc<NodePool>,
    guilds: Mutex<HashMap<GuildId, GuildQueue>>,
    database: Option<Database>,
    retry_delay: Duration,
}

impl MusicManager {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        voice: Arc<dyn VoiceGateway>,
        nodes: Arc<NodePool>,
        database: Option<Database>,
    ) -> Self {
        Self {
            backend,
            voice,
            nodes,
            guilds: Mutex::new(HashMap::new()),
            database,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Pause between voice connection attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn nodes(&self) -> &Arc<NodePool> {
        &self.nodes
    }

    pub fn voice(&self) -> &Arc<dyn VoiceGateway> {
        &self.voice
    }

    async fn with_queue<R>(
        &self,
        guild_id: GuildId,
        f: impl FnOnce(&mut GuildQueue) -> R,
    ) -> Option<R> {
        let mut guilds = self.guilds.lock().await;
        guilds.get_mut(&guild_id).map(f)
    }

    async fn with_queue_or_default<R>(
        &self,
        guild_id: GuildId,
        f: impl FnOnce(&mut GuildQueue) -> R,
    ) -> R {
        let mut guilds = self.guilds.lock().await;
        f(guilds.entry(guild_id).or_default())
    }

    /// Copy of the guild's queue state.
    pub async fn queue(&self, guild_id: GuildId) -> Option<GuildQueue> {
        self.guilds.lock().await.get(&guild_id).cloned()
    }

    pub async fn is_active(&self, guild_id: GuildId) -> bool {
        self.guilds.lock().await.contains_key(&guild_id)
    }

    /// True while the player is being torn down and rebuilt.
    pub async fn is_rebuilding(&self, guild_id: GuildId) -> bool {
        self.with_queue(guild_id, |q| q.rebuilding).await.unwrap_or(false)
    }

    pub async fn active_guilds(&self) -> Vec<GuildId> {
        self.guilds.lock().await.keys().copied().collect()
    }

    pub async fn current_track(&self, guild_id: GuildId) -> Option<Track> {
        self.with_queue(guild_id, |q| q.current.clone()).await.flatten()
    }

    pub async fn text_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.with_queue(guild_id, |q| q.text_channel).await.flatten()
    }

    pub async fn set_text_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.with_queue_or_default(guild_id, |q| q.text_channel = Some(channel_id))
            .await;
    }

    /// The channel the bot is in, from our own state first, then the voice gateway.
    pub async fn voice_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        match self.with_queue(guild_id, |q| q.voice_channel).await.flatten() {
            Some(channel) => Some(channel),
            None => self.voice.current_channel(guild_id).await,
        }
    }

    pub async fn player_state(&self, guild_id: GuildId) -> Option<PlayerSnapshot> {
        match self.backend.player_state(guild_id).await {
            Ok(state) => state,
            Err(e) => {
                debug!("Failed to fetch player for guild {}: {}", guild_id, e);
                None
            }
        }
    }

    pub async fn position(&self, guild_id: GuildId) -> Duration {
        self.player_state(guild_id)
            .await
            .map(|s| s.position)
            .unwrap_or_default()
    }

    async fn probe_player(&self, guild_id: GuildId) -> PlayerProbe {
        if !self.backend.node_connected(guild_id).await {
            return PlayerProbe::NodeDown;
        }
        if !self.backend.has_player(guild_id) {
            return PlayerProbe::Missing;
        }
        match self.backend.player_state(guild_id).await {
            Ok(Some(_)) => PlayerProbe::Healthy,
            Ok(None) => PlayerProbe::Missing,
            Err(e) => PlayerProbe::Failed(e),
        }
    }

    /// Makes sure the guild has a working player in `voice_channel`, connecting,
    /// moving or rebuilding as needed.
    pub async fn ensure_active_player(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: Option<ChannelId>,
    ) -> MusicResult<ReconnectPlan> {
        if !self.nodes.ensure_connected().await {
            return Err(MusicError::NoNodesAvailable);
        }

        let current = self.voice.current_channel(guild_id).await;
        let probe = if current.is_some() {
            self.probe_player(guild_id).await
        } else {
            PlayerProbe::Missing
        };
        let plan = plan_reconnect(current, voice_channel, &probe);
        debug!("Player plan for guild {}: {:?}", guild_id, plan);

        self.with_queue_or_default(guild_id, |q| {
            if q.text_channel.is_none() {
                q.text_channel = text_channel;
            }
        })
        .await;

        match &plan {
            ReconnectPlan::Healthy => {}
            ReconnectPlan::Connect | ReconnectPlan::Move(_) => {
                self.connect_with_retry(guild_id, voice_channel).await?;
            }
            ReconnectPlan::Rebuild(reason) => {
                warn!("Rebuilding player for guild {}: {}", guild_id, reason);
                let position = self.rebuild(guild_id, voice_channel, true).await?;
                self.resume_after_rebuild(guild_id, position).await;
            }
        }

        self.with_queue_or_default(guild_id, |q| q.voice_channel = Some(voice_channel))
            .await;
        Ok(plan)
    }

    /// Joins the channel and creates the player, with one cleanup and retry on failure.
    pub async fn connect_with_retry(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<()> {
        let mut last_error = None;

        for attempt in 1..=CONNECT_ATTEMPTS {
            match self.try_connect(guild_id, channel_id).await {
                Ok(()) => {
                    info!(
                        "Connected player for guild {} to channel {} (attempt {})",
                        guild_id, channel_id, attempt
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Connect attempt {}/{} for guild {} failed: {}",
                        attempt, CONNECT_ATTEMPTS, guild_id, e
                    );
                    last_error = Some(e);
                    if attempt < CONNECT_ATTEMPTS {
                        self.cleanup_connection(guild_id).await;
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(MusicError::NotConnected))
    }

    async fn try_connect(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<()> {
        let connection = self.voice.join(guild_id, channel_id).await?;
        self.backend.connect(guild_id, connection).await
    }

    async fn cleanup_connection(&self, guild_id: GuildId) {
        let _ = self.force_destroy(guild_id).await;
        if let Err(e) = self.voice.leave(guild_id).await {
            debug!("Leaving voice during cleanup for guild {} failed: {}", guild_id, e);
        }
    }

    /// Destroys the node-side player. A 404 means it is already gone.
    pub async fn force_destroy(&self, guild_id: GuildId) -> MusicResult<()> {
        match self.backend.destroy(guild_id).await {
            Ok(()) => Ok(()),
            Err(e) if e.status() == Some(404) => Ok(()),
            Err(e) => {
                warn!("Failed to destroy player for guild {}: {}", guild_id, e);
                Err(e)
            }
        }
    }

    /// Tears the player down and builds a fresh one, keeping queue, loop mode, volume
    /// and filters. Returns the playback position the old player was at.
    pub async fn rebuild(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        requeue_current: bool,
    ) -> MusicResult<Duration> {
        let position = self.position(guild_id).await;
        let snapshot = self
            .with_queue_or_default(guild_id, |q| {
                q.rebuilding = true;
                q.snapshot(position)
            })
            .await;
        let volume = snapshot.volume;
        let filter = self.with_queue(guild_id, |q| q.active_filter).await.flatten();

        self.cleanup_connection(guild_id).await;
        let result = self.connect_with_retry(guild_id, channel_id).await;

        self.with_queue_or_default(guild_id, |q| {
            q.restore(snapshot, requeue_current);
            q.voice_channel = Some(channel_id);
            q.paused = false;
            q.rebuilding = false;
        })
        .await;
        result?;

        if volume != DEFAULT_VOLUME {
            self.backend.set_volume(guild_id, volume).await?;
        }
        if let Some(preset) = filter {
            self.backend.set_filters(guild_id, &preset.settings()).await?;
        }

        info!("Rebuilt player for guild {}", guild_id);
        Ok(position)
    }

    async fn resume_after_rebuild(&self, guild_id: GuildId, position: Duration) {
        let idle = self
            .with_queue(guild_id, |q| q.current.is_none() && !q.upcoming.is_empty())
            .await
            .unwrap_or(false);
        if !idle {
            return;
        }

        match self.play_next(guild_id).await {
            Ok(Some(track)) if track.is_seekable && !position.is_zero() => {
                if let Err(e) = self.backend.seek(guild_id, position).await {
                    debug!("Could not restore position in guild {}: {}", guild_id, e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to resume playback in guild {}: {}", guild_id, e),
        }
    }

    /// Plays `track`, rebuilding the player once when the node no longer knows it.
    /// A player left paused is resumed so the new track is actually heard.
    pub async fn safe_play(&self, guild_id: GuildId, track: &Track) -> MusicResult<()> {
        match self.backend.play(guild_id, track).await {
            Ok(()) => {}
            Err(e) if e.requires_rebuild_on_play() => {
                warn!(
                    "Play failed in guild {} ({}), rebuilding player and retrying",
                    guild_id, e
                );
                let channel = self
                    .voice_channel(guild_id)
                    .await
                    .ok_or(MusicError::NotConnected)?;
                self.rebuild(guild_id, channel, false).await?;
                self.with_queue_or_default(guild_id, |q| q.current = Some(track.clone()))
                    .await;
                self.backend.play(guild_id, track).await?;
            }
            Err(e) => return Err(e),
        }

        self.resume_if_paused(guild_id).await;
        Ok(())
    }

    async fn resume_if_paused(&self, guild_id: GuildId) {
        if !self.is_paused(guild_id).await {
            return;
        }
        match self.backend.set_paused(guild_id, false).await {
            Ok(()) => {
                self.with_queue(guild_id, |q| q.paused = false).await;
            }
            Err(e) => warn!("Could not resume paused player in guild {}: {}", guild_id, e),
        }
    }

    /// Queues `tracks` and starts playback when the player is idle.
    pub async fn play_or_enqueue(
        &self,
        guild_id: GuildId,
        tracks: Vec<Track>,
        text_channel: Option<ChannelId>,
    ) -> MusicResult<Enqueued> {
        if tracks.is_empty() {
            return Err(MusicError::NoResults);
        }

        let position = self.position(guild_id).await;
        let added = tracks.len();
        // The idle player claims its first track under the same lock, so a
        // concurrent request sees it busy and only queues.
        let (starting, first_position, eta) = self
            .with_queue_or_default(guild_id, |q| {
                if q.text_channel.is_none() {
                    q.text_channel = text_channel;
                }
                let idle = q.current.is_none();
                let first_position = q.enqueue_many(tracks);
                let eta = q.eta_for(first_position, position);
                let starting = if idle { q.advance() } else { None };
                (starting, first_position, eta)
            })
            .await;

        let started = match starting {
            Some(track) => self.play_from(guild_id, track).await?,
            None => None,
        };
        let queue_len = self.with_queue(guild_id, |q| q.len()).await.unwrap_or(0);

        Ok(Enqueued {
            first_position: if started.is_some() { 0 } else { first_position },
            started,
            added,
            eta,
            queue_len,
        })
    }

    /// Pops and plays the next track, skipping tracks that can't be played.
    /// `Ok(None)` means the queue is empty.
    pub async fn play_next(&self, guild_id: GuildId) -> MusicResult<Option<Track>> {
        match self.with_queue(guild_id, |q| q.advance()).await.flatten() {
            Some(track) => self.play_from(guild_id, track).await,
            None => Ok(None),
        }
    }

    /// Plays `track`, which is already current, then keeps advancing past
    /// anything that fails to play.
    async fn play_from(&self, guild_id: GuildId, track: Track) -> MusicResult<Option<Track>> {
        let mut next = Some(track);
        while let Some(track) = next {
            match self.safe_play(guild_id, &track).await {
                Ok(()) => {
                    debug!("Playing '{}' in guild {}", track.title, guild_id);
                    return Ok(Some(track));
                }
                Err(e) if e.is_fatal() => {
                    self.with_queue(guild_id, |q| {
                        q.current = None;
                        q.push_front(track);
                    })
                    .await;
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Skipping unplayable track '{}' in guild {}: {}",
                        track.title, guild_id, e
                    );
                    next = self
                        .with_queue(guild_id, |q| {
                            q.last_error = Some(TrackFailure {
                                message: e.to_string(),
                                severity: "common".to_string(),
                            });
                            q.advance()
                        })
                        .await
                        .flatten();
                }
            }
        }
        Ok(None)
    }

    /// Stops the current track; the end event moves the queue on.
    /// Returns the track that will play next, if any.
    pub async fn skip(&self, guild_id: GuildId) -> MusicResult<Option<Track>> {
        let (current, next) = self
            .with_queue(guild_id, |q| (q.current.clone(), q.peek_next().cloned()))
            .await
            .ok_or(MusicError::NoPlayer)?;
        if current.is_none() {
            return Err(MusicError::NoTrack);
        }

        self.backend.stop(guild_id).await?;
        Ok(next)
    }

    /// Jumps to the 1-based queue position. The queue is left untouched on failure.
    pub async fn skip_to(&self, guild_id: GuildId, position: usize) -> MusicResult<Track> {
        let (dropped, target, playing) = self
            .with_queue(guild_id, |q| {
                let dropped = q.skip_to(position)?;
                Some((dropped, q.peek_next().cloned(), q.current.is_some()))
            })
            .await
            .ok_or(MusicError::NoPlayer)?
            .ok_or(MusicError::InvalidPosition)?;
        let target = target.ok_or(MusicError::InvalidPosition)?;

        let result = if playing {
            self.backend.stop(guild_id).await.map(|_| ())
        } else {
            self.play_next(guild_id).await.map(|_| ())
        };

        match result {
            Ok(()) => Ok(target),
            Err(e) => {
                warn!("skip_to failed in guild {}, restoring queue: {}", guild_id, e);
                self.with_queue(guild_id, |q| q.restore_front(dropped)).await;
                Err(e)
            }
        }
    }

    /// Stops playback and leaves, keeping the queue for `/resumequeue`.
    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<Option<QueueSnapshot>> {
        if !self.is_active(guild_id).await && self.voice.current_channel(guild_id).await.is_none()
        {
            return Err(MusicError::NotConnected);
        }
        self.disconnect(guild_id, true).await
    }

    /// Drops the guild's state, then tears down the player and the voice connection.
    /// With `save`, a non-empty queue is written to the database first.
    pub async fn disconnect(
        &self,
        guild_id: GuildId,
        save: bool,
    ) -> MusicResult<Option<QueueSnapshot>> {
        let position = self.position(guild_id).await;
        let state = self.guilds.lock().await.remove(&guild_id);
        let snapshot = state.map(|q| q.snapshot(position));

        if save {
            if let (Some(snapshot), Some(database)) = (&snapshot, &self.database) {
                if !snapshot.is_empty() {
                    match database.save_queue(guild_id, snapshot) {
                        Ok(()) => info!(
                            "Saved {} track(s) for guild {}",
                            snapshot.tracks().count(),
                            guild_id
                        ),
                        Err(e) => error!("Failed to save queue for guild {}: {}", guild_id, e),
                    }
                }
            }
        }

        let _ = self.force_destroy(guild_id).await;
        if let Err(e) = self.voice.leave(guild_id).await {
            warn!("Failed to leave voice in guild {}: {}", guild_id, e);
        }

        info!("Disconnected from guild {}", guild_id);
        Ok(snapshot)
    }

    /// Flips pause and returns the new paused state.
    pub async fn toggle_pause(&self, guild_id: GuildId) -> MusicResult<bool> {
        let paused = self
            .with_queue(guild_id, |q| q.current.as_ref().map(|_| q.paused))
            .await
            .ok_or(MusicError::NoPlayer)?
            .ok_or(MusicError::NoTrack)?;
        self.set_paused(guild_id, !paused).await?;
        Ok(!paused)
    }

    pub async fn set_paused(&self, guild_id: GuildId, paused: bool) -> MusicResult<()> {
        self.backend.set_paused(guild_id, paused).await?;
        self.with_queue(guild_id, |q| q.paused = paused).await;
        Ok(())
    }

    pub async fn is_paused(&self, guild_id: GuildId) -> bool {
        self.with_queue(guild_id, |q| q.paused).await.unwrap_or(false)
    }

    pub async fn set_volume(&self, guild_id: GuildId, volume: u16) -> MusicResult<u16> {
        if volume > MAX_VOLUME {
            return Err(MusicError::OutOfRange);
        }
        if !self.is_active(guild_id).await {
            return Err(MusicError::NoPlayer);
        }
        self.backend.set_volume(guild_id, volume).await?;
        self.with_queue(guild_id, |q| q.volume = volume).await;
        Ok(volume)
    }

    /// Moves the volume by `delta`, clamped to 0..=150.
    pub async fn change_volume(&self, guild_id: GuildId, delta: i32) -> MusicResult<u16> {
        let current = self
            .with_queue(guild_id, |q| q.volume)
            .await
            .ok_or(MusicError::NoPlayer)?;
        let target = (i32::from(current) + delta).clamp(0, i32::from(MAX_VOLUME)) as u16;
        self.set_volume(guild_id, target).await
    }

    pub async fn seek(&self, guild_id: GuildId, position: Duration) -> MusicResult<Duration> {
        let track = self
            .current_track(guild_id)
            .await
            .ok_or(MusicError::NoTrack)?;
        if !track.is_seekable || track.is_stream || position > track.length() {
            return Err(MusicError::InvalidPosition);
        }
        self.backend.seek(guild_id, position).await?;
        Ok(position)
    }

    /// Restarts the current track when it is past the first seconds.
    /// Returns `false` when there was nothing to go back to.
    pub async fn restart_or_previous(&self, guild_id: GuildId) -> MusicResult<bool> {
        if self.current_track(guild_id).await.is_none() {
            return Err(MusicError::NoTrack);
        }
        if self.position(guild_id).await > RESTART_THRESHOLD {
            self.backend.seek(guild_id, Duration::ZERO).await?;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn cycle_loop(&self, guild_id: GuildId) -> MusicResult<LoopMode> {
        self.with_queue(guild_id, |q| {
            q.loop_mode = q.loop_mode.next();
            q.loop_mode
        })
        .await
        .ok_or(MusicError::NoPlayer)
    }

    /// Shuffles the upcoming tracks and returns how many there are.
    pub async fn shuffle(&self, guild_id: GuildId) -> MusicResult<usize> {
        self.with_queue(guild_id, |q| {
            q.shuffle();
            q.len()
        })
        .await
        .ok_or(MusicError::NoPlayer)
    }

    pub async fn clear(&self, guild_id: GuildId) -> MusicResult<usize> {
        self.with_queue(guild_id, |q| q.clear())
            .await
            .ok_or(MusicError::NoPlayer)
    }

    pub async fn remove(&self, guild_id: GuildId, position: usize) -> MusicResult<Track> {
        self.with_queue(guild_id, |q| q.remove(position))
            .await
            .ok_or(MusicError::NoPlayer)?
            .ok_or(MusicError::InvalidPosition)
    }

    /// Toggles a preset on the current track. Returns the preset now active.
    pub async fn toggle_filter(
        &self,
        guild_id: GuildId,
        preset: FilterPreset,
    ) -> MusicResult<Option<FilterPreset>> {
        let active = self
            .with_queue(guild_id, |q| q.current.as_ref().map(|_| q.active_filter))
            .await
            .ok_or(MusicError::NoPlayer)?
            .ok_or(MusicError::NoTrack)?;
        let next = toggle_preset(active, preset);
        self.apply_filter(guild_id, next).await?;
        Ok(next)
    }

    pub async fn set_bass_boost(
        &self,
        guild_id: GuildId,
        level: Option<BassBoostLevel>,
    ) -> MusicResult<()> {
        if self.current_track(guild_id).await.is_none() {
            return Err(MusicError::NoTrack);
        }
        self.apply_filter(guild_id, level.map(FilterPreset::BassBoost))
            .await
    }

    pub async fn reset_filters(&self, guild_id: GuildId) -> MusicResult<()> {
        if !self.is_active(guild_id).await {
            return Err(MusicError::NoPlayer);
        }
        self.apply_filter(guild_id, None).await
    }

    async fn apply_filter(&self, guild_id: GuildId, preset: Option<FilterPreset>) -> MusicResult<()> {
        let settings = preset.map(|p| p.settings()).unwrap_or_else(FilterSettings::default);
        self.backend.set_filters(guild_id, &settings).await?;
        self.with_queue(guild_id, |q| q.active_filter = preset).await;
        Ok(())
    }

    /// Bookkeeping for a track that started. Returns our copy of it, which carries
    /// the requester, falling back to the event's track.
    pub async fn handle_track_start(&self, guild_id: GuildId, track: Track) -> Option<Track> {
        self.with_queue(guild_id, |q| {
            q.fallback_in_progress = false;
            q.paused = false;
            match &q.current {
                Some(current) if current.is_same(&track) => current.clone(),
                _ => track,
            }
        })
        .await
    }

    pub async fn handle_track_exception(&self, guild_id: GuildId, message: &str, severity: &str) {
        warn!(
            "Track exception in guild {} ({}): {}",
            guild_id, severity, message
        );
        self.with_queue(guild_id, |q| {
            q.last_error = Some(TrackFailure {
                message: message.to_string(),
                severity: severity.to_string(),
            })
        })
        .await;
    }

    pub async fn clear_last_error(&self, guild_id: GuildId) {
        self.with_queue(guild_id, |q| q.last_error = None).await;
    }

    pub async fn handle_track_end(
        &self,
        guild_id: GuildId,
        track: Track,
        reason: EndReason,
    ) -> EndOutcome {
        let Some((loop_mode, rebuilding, current)) = self
            .with_queue(guild_id, |q| (q.loop_mode, q.rebuilding, q.current.clone()))
            .await
        else {
            debug!("Track ended in guild {} without player state", guild_id);
            return EndOutcome::Ignored;
        };
        if rebuilding {
            return EndOutcome::Ignored;
        }
        let ended = current.unwrap_or(track);

        match end_action(reason, loop_mode) {
            EndAction::Ignore => EndOutcome::Ignored,
            EndAction::TryFallback => self.try_fallback(guild_id, ended).await,
            EndAction::ClearAndAdvance => self.continue_queue(guild_id, true).await,
            EndAction::Replay => match self.safe_play(guild_id, &ended).await {
                Ok(()) => EndOutcome::Continued {
                    next: ended,
                    clear_message: false,
                },
                Err(e) => {
                    warn!("Replay failed in guild {}: {}", guild_id, e);
                    self.continue_queue(guild_id, false).await
                }
            },
            EndAction::RequeueAndAdvance => {
                self.with_queue(guild_id, |q| {
                    q.enqueue(ended);
                })
                .await;
                self.continue_queue(guild_id, false).await
            }
            EndAction::Advance => self.continue_queue(guild_id, false).await,
        }
    }

    async fn continue_queue(&self, guild_id: GuildId, clear_message: bool) -> EndOutcome {
        match self.play_next(guild_id).await {
            Ok(Some(next)) => EndOutcome::Continued {
                next,
                clear_message,
            },
            Ok(None) => EndOutcome::Finished {
                clear_message: true,
            },
            Err(e) => {
                error!("Failed to continue queue in guild {}: {}", guild_id, e);
                EndOutcome::Finished {
                    clear_message: true,
                }
            }
        }
    }

    async fn try_fallback(&self, guild_id: GuildId, failed: Track) -> EndOutcome {
        let key = fallback_key(&failed);
        let (failure, eligible) = self
            .with_queue(guild_id, |q| {
                let failure = q.last_error.take().unwrap_or_default();
                let eligible = !q.fallback_in_progress
                    && !q.fallback_attempts.contains(&key)
                    && needs_fallback(&failure.message, &failure.severity);
                if eligible {
                    q.fallback_attempts.insert(key.clone());
                    q.fallback_in_progress = true;
                }
                (failure, eligible)
            })
            .await
            .unwrap_or_default();

        if eligible {
            info!("Looking for a fallback for '{}' in guild {}", failed.title, guild_id);
            if let Some(replacement) = self.find_and_play_replacement(guild_id, &failed).await {
                return EndOutcome::FellBack {
                    failed,
                    replacement,
                };
            }
            self.with_queue(guild_id, |q| q.fallback_in_progress = false)
                .await;
        }

        let next = match self.play_next(guild_id).await {
            Ok(next) => next,
            Err(e) => {
                error!("Failed to continue after load failure in guild {}: {}", guild_id, e);
                None
            }
        };
        EndOutcome::Failed {
            failed,
            failure,
            next,
        }
    }

    async fn find_and_play_replacement(&self, guild_id: GuildId, failed: &Track) -> Option<Track> {
        for query in fallback_queries(failed) {
            let candidates = match self.nodes.search(&query).await {
                Ok(result) => result.into_tracks(),
                Err(e) => {
                    debug!("Fallback query '{}' failed: {}", query, e);
                    continue;
                }
            };
            let Some(replacement) = pick_replacement(failed, candidates) else {
                continue;
            };

            self.with_queue(guild_id, |q| q.current = Some(replacement.clone()))
                .await;
            match self.safe_play(guild_id, &replacement).await {
                Ok(()) => {
                    info!(
                        "Fell back from '{}' to '{}' in guild {}",
                        failed.title, replacement.title, guild_id
                    );
                    return Some(replacement);
                }
                Err(e) => {
                    warn!("Fallback track failed to play in guild {}: {}", guild_id, e);
                    return None;
                }
            }
        }
        None
    }

    pub fn saved_queue(&self, guild_id: GuildId) -> MusicResult<Option<QueueSnapshot>> {
        let Some(database) = &self.database else {
            return Ok(None);
        };
        database.load_queue(guild_id).map_err(|e| MusicError::Backend {
            status: None,
            message: e.to_string(),
        })
    }

    /// Loads the saved queue back into a fresh player. Every saved track is resolved
    /// again since encoded tracks may be stale.
    pub async fn restore_saved_queue(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: Option<ChannelId>,
    ) -> MusicResult<RestoredQueue> {
        let snapshot = self.saved_queue(guild_id)?.ok_or(MusicError::NoResults)?;
        let saved: Vec<Track> = snapshot.tracks().cloned().collect();

        self.ensure_active_player(guild_id, voice_channel, text_channel)
            .await?;

        let mut tracks = Vec::with_capacity(saved.len());
        for (i, track) in saved.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(SAVED_TRACK_DELAY).await;
            }
            match self.nodes.search(&saved_track_query(track)).await {
                Ok(result) => {
                    if let Some(found) = result.into_tracks().into_iter().next() {
                        tracks.push(Track {
                            requester: track.requester,
                            ..found
                        });
                    }
                }
                Err(e) => {
                    warn!("Stopped restoring saved queue for guild {}: {}", guild_id, e);
                    break;
                }
            }
        }

        if tracks.is_empty() {
            let _ = self.disconnect(guild_id, false).await;
            return Err(MusicError::NoResults);
        }

        if let Some(database) = &self.database {
            if let Err(e) = database.clear_queue(guild_id) {
                warn!("Failed to clear saved queue for guild {}: {}", guild_id, e);
            }
        }

        let restored = tracks.len();
        self.with_queue_or_default(guild_id, |q| q.loop_mode = snapshot.loop_mode)
            .await;
        let enqueued = self.play_or_enqueue(guild_id, tracks, text_channel).await?;
        if snapshot.volume != DEFAULT_VOLUME {
            let _ = self.set_volume(guild_id, snapshot.volume.min(MAX_VOLUME)).await;
        }

        Ok(RestoredQueue {
            first: enqueued.started,
            restored,
            skipped: saved.len() - restored,
            queue_len: enqueued.queue_len,
        })
    }
}

/// Lookup used to resolve a saved track again.
pub fn saved_track_query(track: &Track) -> String {
    if let Some(uri) = track.uri.as_ref().filter(|u| !u.is_empty()) {
        return uri.clone();
    }
    if !track.identifier.is_empty() {
        return track.identifier.clone();
    }
    format!("ytsearch:{} {}", track.title, track.author)
        .trim()
        .to_string()
}
