//! Pauses when everyone leaves the bot's voice channel and leaves after a while.

use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use ::serenity::all::{Cache, ChannelId, ChannelType, GuildId, Http};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::embedded_messages::{COLOR_INFO, COLOR_WARNING, simple_embed};
use super::event_handlers::{PlayerUi, send_embed};
use super::music_manager::MusicManager;
use super::voice_status::VoiceStatus;
use crate::Data;
use crate::utils::localization::Translator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LonelyAction {
    Nothing,
    StartCountdown,
    Cancel,
}

/// What to do given the listeners left and whether a countdown is running.
pub fn decide(listeners: usize, counting: bool) -> LonelyAction {
    match (listeners, counting) {
        (0, false) => LonelyAction::StartCountdown,
        (n, true) if n > 0 => LonelyAction::Cancel,
        _ => LonelyAction::Nothing,
    }
}

/// Non-bot members among `(channel, is_bot)` voice states that sit in `channel`.
pub fn count_listeners(states: &[(Option<ChannelId>, bool)], channel: ChannelId) -> usize {
    states
        .iter()
        .filter(|(c, bot)| *c == Some(channel) && !bot)
        .count()
}

/// Player channel first, then the guild's system channel, then its first text channel.
pub fn pick_text_channel(
    player: Option<ChannelId>,
    system: Option<ChannelId>,
    first_text: Option<ChannelId>,
) -> Option<ChannelId> {
    player.or(system).or(first_text)
}

fn voice_states(cache: &Cache, guild_id: GuildId) -> Vec<(Option<ChannelId>, bool)> {
    let Some(guild) = cache.guild(guild_id) else {
        return Vec::new();
    };
    let states: Vec<_> = guild
        .voice_states
        .values()
        .map(|s| {
            let member_bot = s.member.as_ref().map(|m| m.user.bot);
            (s.user_id, s.channel_id, member_bot)
        })
        .collect();
    drop(guild);

    states
        .into_iter()
        .map(|(user_id, channel, member_bot)| {
            let bot = member_bot
                .or_else(|| cache.user(user_id).map(|u| u.bot))
                .unwrap_or(false);
            (channel, bot)
        })
        .collect()
}

fn fallback_channels(cache: &Cache, guild_id: GuildId) -> (Option<ChannelId>, Option<ChannelId>) {
    let Some(guild) = cache.guild(guild_id) else {
        return (None, None);
    };
    let first_text = guild
        .channels
        .values()
        .filter(|c| c.kind == ChannelType::Text)
        .min_by_key(|c| c.position)
        .map(|c| c.id);
    (guild.system_channel_id, first_text)
}

struct Countdown {
    task: JoinHandle<()>,
    /// Whether the pause was ours to undo.
    resume: bool,
}

pub struct LonelyTracker {
    timeout: Duration,
    countdowns: DashMap<GuildId, Countdown>,
}

impl LonelyTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            countdowns: DashMap::new(),
        }
    }

    pub fn is_counting(&self, guild_id: GuildId) -> bool {
        self.countdowns.contains_key(&guild_id)
    }

    /// Drops the countdown. Returns whether playback should be resumed.
    pub fn cancel(&self, guild_id: GuildId) -> Option<bool> {
        self.countdowns.remove(&guild_id).map(|(_, countdown)| {
            countdown.task.abort();
            countdown.resume
        })
    }

    /// Re-checks the bot's channel after a voice state change in the guild.
    pub async fn on_voice_update(
        self: &Arc<Self>,
        ctx: &serenity::Context,
        data: &Data,
        guild_id: GuildId,
    ) {
        let Some(channel) = data.music.voice().current_channel(guild_id).await else {
            self.cancel(guild_id);
            return;
        };
        if !data.music.is_active(guild_id).await {
            return;
        }

        let listeners = count_listeners(&voice_states(&ctx.cache, guild_id), channel);
        let action = decide(listeners, self.is_counting(guild_id));
        debug!(
            "Guild {} has {} listener(s) in {}: {:?}",
            guild_id, listeners, channel, action
        );

        let tr = data.translator(Some(guild_id));
        let (system, first_text) = fallback_channels(&ctx.cache, guild_id);
        let text_channel = pick_text_channel(data.music.text_channel(guild_id).await, system, first_text);

        match action {
            LonelyAction::Nothing => {}
            LonelyAction::StartCountdown => {
                let resume = !data.music.is_paused(guild_id).await
                    && data.music.current_track(guild_id).await.is_some();
                if resume {
                    if let Err(e) = data.music.set_paused(guild_id, true).await {
                        warn!("Failed to pause lonely player in guild {}: {}", guild_id, e);
                    }
                    data.ui.refresh(guild_id, &tr).await;
                }
                if let Some(text_channel) = text_channel {
                    let seconds = self.timeout.as_secs().to_string();
                    send_embed(
                        &ctx.http,
                        text_channel,
                        simple_embed(
                            format!("⏸️ {}", tr.t("player.lonely.title")),
                            tr.tf("player.lonely.pause", &[("seconds", seconds)]),
                            COLOR_WARNING,
                        ),
                    )
                    .await;
                }
                info!("Nobody listening in guild {}, counting down", guild_id);
                let job = CountdownJob {
                    http: ctx.http.clone(),
                    music: data.music.clone(),
                    ui: data.ui.clone(),
                    voice_status: data.voice_status.clone(),
                    text_channel,
                    voice_channel: channel,
                    tr,
                };
                self.start_countdown(guild_id, resume, job.run(guild_id));
            }
            LonelyAction::Cancel => {
                let resume = self.cancel(guild_id).unwrap_or(false);
                if resume {
                    if let Err(e) = data.music.set_paused(guild_id, false).await {
                        warn!("Failed to resume player in guild {}: {}", guild_id, e);
                    }
                    data.ui.refresh(guild_id, &tr).await;
                }
                if let Some(text_channel) = text_channel {
                    send_embed(
                        &ctx.http,
                        text_channel,
                        simple_embed(
                            format!("▶️ {}", tr.t("player.lonely.title")),
                            tr.t("player.lonely.resume"),
                            COLOR_INFO,
                        ),
                    )
                    .await;
                }
                info!("Listener back in guild {}, countdown cancelled", guild_id);
            }
        }
    }

    /// Runs `on_timeout` once the countdown expires without being cancelled.
    fn start_countdown<F>(self: &Arc<Self>, guild_id: GuildId, resume: bool, on_timeout: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tracker = Arc::clone(self);
        let timeout = self.timeout;
        let (armed, wait_armed) = oneshot::channel();
        let task = tokio::spawn(async move {
            // The entry has to exist before the timer may clear it.
            if wait_armed.await.is_err() {
                return;
            }
            tokio::time::sleep(timeout).await;
            tracker.countdowns.remove(&guild_id);
            on_timeout.await;
        });

        if let Some(old) = self.countdowns.insert(guild_id, Countdown { task, resume }) {
            old.task.abort();
        }
        let _ = armed.send(());
    }
}

struct CountdownJob {
    http: Arc<Http>,
    music: Arc<MusicManager>,
    ui: Arc<PlayerUi>,
    voice_status: VoiceStatus,
    text_channel: Option<ChannelId>,
    voice_channel: ChannelId,
    tr: Translator,
}

impl CountdownJob {
    async fn run(self, guild_id: GuildId) {
        info!("Leaving guild {} after nobody came back", guild_id);
        self.ui.clear_message(guild_id).await;
        self.voice_status.clear(self.voice_channel).await;
        if let Err(e) = self.music.disconnect(guild_id, true).await {
            warn!("Lonely disconnect failed in guild {}: {}", guild_id, e);
        }

        if let Some(text_channel) = self.text_channel {
            send_embed(
                &self.http,
                text_channel,
                simple_embed(
                    format!("👋 {}", self.tr.t("player.lonely.title")),
                    self.tr.t("player.lonely.disconnect"),
                    COLOR_INFO,
                ),
            )
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0, false, LonelyAction::StartCountdown)]
    #[test_case(0, true, LonelyAction::Nothing)]
    #[test_case(2, true, LonelyAction::Cancel)]
    #[test_case(1, false, LonelyAction::Nothing)]
    fn decisions(listeners: usize, counting: bool, expected: LonelyAction) {
        assert_eq!(decide(listeners, counting), expected);
    }

    #[test]
    fn bots_and_other_channels_do_not_count() {
        let here = ChannelId::new(1);
        let elsewhere = ChannelId::new(2);
        let states = vec![
            (Some(here), true),
            (Some(here), false),
            (Some(elsewhere), false),
            (None, false),
        ];
        assert_eq!(count_listeners(&states, here), 1);
    }

    #[test]
    fn text_channel_preference() {
        let player = Some(ChannelId::new(1));
        let system = Some(ChannelId::new(2));
        let first = Some(ChannelId::new(3));

        assert_eq!(pick_text_channel(player, system, first), player);
        assert_eq!(pick_text_channel(None, system, first), system);
        assert_eq!(pick_text_channel(None, None, first), first);
        assert_eq!(pick_text_channel(None, None, None), None);
    }

    #[tokio::test]
    async fn cancel_reports_resume_flag() {
        let tracker = LonelyTracker::new(Duration::from_secs(60));
        let guild = GuildId::new(9);
        tracker.countdowns.insert(
            guild,
            Countdown {
                task: tokio::spawn(async {}),
                resume: true,
            },
        );

        assert!(tracker.is_counting(guild));
        assert_eq!(tracker.cancel(guild), Some(true));
        assert_eq!(tracker.cancel(guild), None);
    }

    #[tokio::test]
    async fn zero_timeout_leaves_no_countdown_behind() {
        let tracker = Arc::new(LonelyTracker::new(Duration::ZERO));
        let guild = GuildId::new(9);
        let (fired, wait_fired) = oneshot::channel();

        tracker.start_countdown(guild, true, async move {
            let _ = fired.send(());
        });
        wait_fired.await.unwrap();

        assert!(!tracker.is_counting(guild));
        assert_eq!(tracker.cancel(guild), None);
    }

    #[tokio::test]
    async fn restarting_replaces_the_running_countdown() {
        let tracker = Arc::new(LonelyTracker::new(Duration::from_secs(60)));
        let guild = GuildId::new(9);

        tracker.start_countdown(guild, true, async {});
        tracker.start_countdown(guild, false, async {});

        assert!(tracker.is_counting(guild));
        assert_eq!(tracker.cancel(guild), Some(false));
    }
}
