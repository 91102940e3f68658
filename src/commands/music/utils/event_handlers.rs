//! Track lifecycle events from the audio node, and the now-playing message they drive.

use dashmap::DashMap;
use serenity::all::{
    Cache, ChannelId, CreateActionRow, CreateEmbed, CreateMessage, EditMessage, GuildId, Http,
    MessageId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backend::PlayerEvent;
use super::button_controls::player_controls;
use super::embedded_messages::{
    NowPlayingView, fell_back, now_playing, queue_finished, track_failed,
};
use super::music_manager::{EndOutcome, MusicManager};
use super::queue_manager::{EndReason, Track};
use super::voice_status::VoiceStatus;
use crate::utils::bot_logger::{BotLogger, music_start_embed};
use crate::utils::database::Database;
use crate::utils::localization::{Localizer, Translator, guild_translator};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);
const PAUSED_EXTRA: Duration = Duration::from_secs(2);

/// Where a guild's now-playing message lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// How long the progress task waits before the next edit.
pub fn progress_interval(paused: bool) -> Duration {
    if paused {
        PROGRESS_INTERVAL + PAUSED_EXTRA
    } else {
        PROGRESS_INTERVAL
    }
}

pub async fn send_embed(http: &Http, channel_id: ChannelId, embed: CreateEmbed) {
    if let Err(e) = channel_id
        .send_message(http, CreateMessage::new().embed(embed))
        .await
    {
        warn!("Failed to send message to channel {}: {}", channel_id, e);
    }
}

/// Keeps one now-playing message per guild, with its progress ticker.
pub struct PlayerUi {
    http: Arc<Http>,
    music: Arc<MusicManager>,
    messages: DashMap<GuildId, PlayerMessage>,
    progress: DashMap<GuildId, JoinHandle<()>>,
    /// Live `/queue` messages and the page each one shows.
    queue_views: DashMap<MessageId, usize>,
}

impl PlayerUi {
    pub fn new(http: Arc<Http>, music: Arc<MusicManager>) -> Self {
        Self {
            http,
            music,
            messages: DashMap::new(),
            progress: DashMap::new(),
            queue_views: DashMap::new(),
        }
    }

    pub fn http(&self) -> &Arc<Http> {
        &self.http
    }

    pub fn message(&self, guild_id: GuildId) -> Option<PlayerMessage> {
        self.messages.get(&guild_id).map(|m| *m)
    }

    pub fn music(&self) -> &Arc<MusicManager> {
        &self.music
    }

    pub fn track_queue_view(&self, message_id: MessageId, page: usize) {
        self.queue_views.insert(message_id, page);
    }

    /// Records a page change on a live queue message. Other messages are ignored.
    pub fn set_queue_page(&self, message_id: MessageId, page: usize) {
        if let Some(mut current) = self.queue_views.get_mut(&message_id) {
            *current = page;
        }
    }

    pub fn queue_view_page(&self, message_id: MessageId) -> Option<usize> {
        self.queue_views.get(&message_id).map(|p| *p)
    }

    pub fn drop_queue_view(&self, message_id: MessageId) {
        self.queue_views.remove(&message_id);
    }

    /// Now-playing embed and controls for the guild, if something is playing.
    pub async fn render(
        &self,
        guild_id: GuildId,
        tr: &Translator,
    ) -> Option<(CreateEmbed, Vec<CreateActionRow>)> {
        let queue = self.music.queue(guild_id).await?;
        let track = queue.current.clone()?;
        let position = self.music.position(guild_id).await;
        let view = NowPlayingView::from_queue(&queue, track, position);

        Some((
            now_playing(tr, &view),
            player_controls(tr, queue.paused, queue.loop_mode),
        ))
    }

    /// Replaces the old now-playing message with a fresh one and starts its ticker.
    pub async fn show_now_playing(self: &Arc<Self>, guild_id: GuildId, tr: &Translator) {
        self.clear_message(guild_id).await;

        let Some(channel_id) = self.music.text_channel(guild_id).await else {
            debug!("No text channel for guild {}, skipping now playing", guild_id);
            return;
        };
        let Some((embed, components)) = self.render(guild_id, tr).await else {
            return;
        };

        match channel_id
            .send_message(&self.http, CreateMessage::new().embed(embed).components(components))
            .await
        {
            Ok(message) => {
                self.messages.insert(
                    guild_id,
                    PlayerMessage {
                        channel_id,
                        message_id: message.id,
                    },
                );
                if let Some(track) = self.music.current_track(guild_id).await {
                    self.spawn_progress(guild_id, tr.clone(), track);
                }
            }
            Err(e) => warn!("Failed to send now playing for guild {}: {}", guild_id, e),
        }
    }

    /// Edits the message in place. Returns false when there is no message left to edit.
    pub async fn refresh(&self, guild_id: GuildId, tr: &Translator) -> bool {
        let Some(message) = self.message(guild_id) else {
            return false;
        };
        let Some((embed, components)) = self.render(guild_id, tr).await else {
            return false;
        };

        match message
            .channel_id
            .edit_message(
                &self.http,
                message.message_id,
                EditMessage::new().embed(embed).components(components),
            )
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("Now playing message for guild {} is gone: {}", guild_id, e);
                self.messages.remove(&guild_id);
                false
            }
        }
    }

    /// Stops the ticker and deletes the message.
    pub async fn clear_message(&self, guild_id: GuildId) {
        if let Some((_, task)) = self.progress.remove(&guild_id) {
            task.abort();
        }
        if let Some((_, message)) = self.messages.remove(&guild_id) {
            if let Err(e) = message
                .channel_id
                .delete_message(&self.http, message.message_id)
                .await
            {
                debug!("Could not delete now playing message: {}", e);
            }
        }
    }

    fn spawn_progress(self: &Arc<Self>, guild_id: GuildId, tr: Translator, track: Track) {
        let ui = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                let paused = ui.music.is_paused(guild_id).await;
                tokio::time::sleep(progress_interval(paused)).await;

                let still_current = ui
                    .music
                    .current_track(guild_id)
                    .await
                    .is_some_and(|current| current.is_same(&track));
                if !still_current || !ui.refresh(guild_id, &tr).await {
                    break;
                }
            }
            debug!("Progress updates for guild {} stopped", guild_id);
        });

        if let Some(old) = self.progress.insert(guild_id, task) {
            old.abort();
        }
    }
}

/// Renders player events into Discord messages.
pub struct PlayerEvents {
    pub music: Arc<MusicManager>,
    pub ui: Arc<PlayerUi>,
    pub voice_status: VoiceStatus,
    pub logger: BotLogger,
    pub locales: Arc<Localizer>,
    pub database: Database,
    pub cache: Arc<Cache>,
}

impl PlayerEvents {
    /// Handles events one at a time, in the order the node sent them.
    pub fn spawn(self, mut events: UnboundedReceiver<PlayerEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(event).await;
            }
            info!("Player event channel closed");
        })
    }

    fn translator(&self, guild_id: GuildId) -> Translator {
        guild_translator(&self.locales, &self.database, Some(guild_id))
    }

    async fn send(&self, guild_id: GuildId, embed: CreateEmbed) {
        if let Some(channel_id) = self.music.text_channel(guild_id).await {
            send_embed(self.ui.http(), channel_id, embed).await;
        }
    }

    pub async fn handle(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::TrackStart { guild_id, track } => self.on_track_start(guild_id, track).await,
            PlayerEvent::TrackEnd {
                guild_id,
                track,
                reason,
            } => self.on_track_end(guild_id, track, reason).await,
            PlayerEvent::TrackException {
                guild_id,
                message,
                severity,
                ..
            } => {
                self.music
                    .handle_track_exception(guild_id, &message, &severity)
                    .await
            }
        }
    }

    async fn on_track_start(&self, guild_id: GuildId, track: Track) {
        let Some(track) = self.music.handle_track_start(guild_id, track).await else {
            debug!("Track started in guild {} without player state", guild_id);
            return;
        };
        info!("Now playing '{}' in guild {}", track.title, guild_id);

        if let Err(e) = self.music.voice().deafen(guild_id).await {
            debug!("Could not self-deafen in guild {}: {}", guild_id, e);
        }
        if let Some(channel_id) = self.music.voice_channel(guild_id).await {
            self.voice_status.show_track(channel_id, &track.title).await;
        }

        let tr = self.translator(guild_id);
        self.ui.show_now_playing(guild_id, &tr).await;

        let guild_name = self
            .cache
            .guild(guild_id)
            .map(|g| g.name.clone())
            .unwrap_or_else(|| guild_id.to_string());
        self.logger
            .send(music_start_embed(
                &track.title,
                &track.author,
                &guild_name,
                track.requester.map(|id| id.get()),
            ))
            .await;
    }

    async fn on_track_end(&self, guild_id: GuildId, track: Track, reason: EndReason) {
        debug!("Track '{}' ended in guild {}: {:?}", track.title, guild_id, reason);
        if let Some(channel_id) = self.music.voice_channel(guild_id).await {
            self.voice_status.clear(channel_id).await;
        }

        let tr = self.translator(guild_id);
        let outcome = self.music.handle_track_end(guild_id, track, reason).await;
        let queue_end = queue_end(&outcome);
        match outcome {
            EndOutcome::Ignored => {}
            EndOutcome::Continued {
                next,
                clear_message,
            } => {
                if clear_message {
                    self.ui.clear_message(guild_id).await;
                }
                debug!("Continuing with '{}' in guild {}", next.title, guild_id);
            }
            EndOutcome::FellBack {
                failed,
                replacement,
            } => {
                self.send(guild_id, fell_back(&tr, &failed, &replacement)).await;
            }
            EndOutcome::Failed {
                failed,
                failure,
                next,
            } => {
                error!(
                    "Track '{}' failed in guild {}: {}",
                    failed.title, guild_id, failure.message
                );
                self.send(guild_id, track_failed(&tr, &failed, &failure)).await;
                self.logger
                    .log_error("track load failed", &failure.message)
                    .await;
                if let Some(next) = next {
                    debug!("Continuing with '{}' in guild {}", next.title, guild_id);
                }
            }
            EndOutcome::Finished { .. } => {}
        }

        if let Some(announce) = queue_end {
            self.finish_queue(guild_id, &tr, announce).await;
        }
    }

    async fn finish_queue(&self, guild_id: GuildId, tr: &Translator, announce: bool) {
        self.ui.clear_message(guild_id).await;
        if announce {
            self.send(guild_id, queue_finished(tr)).await;
        }
        self.music.clear_last_error(guild_id).await;
        if let Err(e) = self.music.disconnect(guild_id, true).await {
            warn!("Failed to disconnect after queue end in guild {}: {}", guild_id, e);
        }
    }
}

/// Whether the outcome leaves the queue empty, and if so whether to say so.
/// A failed last track already posted its own message.
fn queue_end(outcome: &EndOutcome) -> Option<bool> {
    match outcome {
        EndOutcome::Finished { .. } => Some(true),
        EndOutcome::Failed { next: None, .. } => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::music::utils::backend::MockAudioBackend;
    use crate::commands::music::utils::node_pool::NodePool;
    use crate::commands::music::utils::queue_manager::TrackFailure;
    use crate::commands::music::utils::voice_gateway::MockVoiceGateway;
    use pretty_assertions::assert_eq;

    #[test]
    fn queue_pages_only_tracked_for_live_views() {
        let music = Arc::new(MusicManager::new(
            Arc::new(MockAudioBackend::new()),
            Arc::new(MockVoiceGateway::new()),
            Arc::new(NodePool::new(Vec::new())),
            None,
        ));
        let ui = PlayerUi::new(Arc::new(Http::new("")), music);
        let live = MessageId::new(1);
        let other = MessageId::new(2);

        ui.track_queue_view(live, 0);
        ui.set_queue_page(live, 3);
        ui.set_queue_page(other, 5);

        assert_eq!(ui.queue_view_page(live), Some(3));
        assert_eq!(ui.queue_view_page(other), None);
        ui.drop_queue_view(live);
        assert_eq!(ui.queue_view_page(live), None);
    }

    #[test]
    fn failed_last_track_ends_the_queue_quietly() {
        let failed = EndOutcome::Failed {
            failed: Track::default(),
            failure: TrackFailure::default(),
            next: None,
        };
        assert_eq!(queue_end(&failed), Some(false));
        assert_eq!(
            queue_end(&EndOutcome::Finished { clear_message: true }),
            Some(true)
        );

        let continued = EndOutcome::Failed {
            failed: Track::default(),
            failure: TrackFailure::default(),
            next: Some(Track::default()),
        };
        assert_eq!(queue_end(&continued), None);
        assert_eq!(queue_end(&EndOutcome::Ignored), None);
    }

    #[test]
    fn paused_players_tick_slower() {
        assert_eq!(progress_interval(false), Duration::from_secs(5));
        assert_eq!(progress_interval(true), Duration::from_secs(7));
    }
}
