use poise::CreateReply;
use serenity::all::{CreateEmbed, CreateEmbedFooter};
use std::time::Duration;

use super::music_manager::{MAX_VOLUME, MusicError};
use super::queue_manager::{GuildQueue, LoopMode, Track, TrackFailure};
use super::{clip, format_duration, format_millis, render_bar, truncate};
use crate::utils::localization::Translator;

pub const COLOR_SUCCESS: u32 = 0x00ff00;
pub const COLOR_INFO: u32 = 0x0099ff;
pub const COLOR_ERROR: u32 = 0xff0000;
pub const COLOR_TRACK_FAILED: u32 = 0xff0033;
pub const COLOR_WARNING: u32 = 0xffff00;

pub const QUEUE_PAGE_SIZE: usize = 10;
const QUEUE_TITLE_CHARS: usize = 42;
const PROGRESS_BAR_LENGTH: usize = 25;
const VOLUME_BAR_LENGTH: usize = 20;

/// Linked track title, or plain text when the track has no uri.
fn track_link(track: &Track) -> String {
    match &track.uri {
        Some(uri) => format!("[{}]({})", track.title, uri),
        None => track.title.clone(),
    }
}

fn requester(track: &Track) -> String {
    track
        .requester
        .map(|id| format!("<@{}>", id))
        .unwrap_or_else(|| "-".to_string())
}

fn duration_label(tr: &Translator, track: &Track) -> String {
    if track.is_stream {
        tr.t("player.live")
    } else {
        format_millis(track.length_ms)
    }
}

/// Translated text for a music error.
pub fn music_error_message(tr: &Translator, err: &MusicError) -> String {
    match err {
        MusicError::NotInGuild => tr.t("errors.not_in_guild"),
        MusicError::UserNotInVoiceChannel => tr.t("errors.not_in_voice"),
        MusicError::NotConnected => tr.t("errors.not_connected"),
        MusicError::NotSameChannel => tr.t("errors.not_same_channel"),
        MusicError::NoPlayer => tr.t("errors.no_player"),
        MusicError::NoTrack => tr.t("errors.no_track"),
        MusicError::NoNodesAvailable => tr.t("errors.no_nodes"),
        MusicError::AllNodesFailed(_) => tr.t("errors.all_nodes_failed"),
        MusicError::NoResults => tr.t("errors.no_results"),
        MusicError::Backend { message, .. } => tr.tf(
            "errors.backend",
            &[("error", truncate(message, 200))],
        ),
        MusicError::JoinError(e) => tr.tf("errors.join", &[("error", e.clone())]),
        MusicError::InvalidPosition => tr.t("errors.invalid_position"),
        MusicError::OutOfRange => tr.t("errors.out_of_range"),
    }
}

pub fn error_embed(tr: &Translator, description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("❌ {}", tr.t("errors.title")))
        .description(description)
        .color(COLOR_ERROR)
}

/// Ephemeral error reply.
pub fn error_reply(tr: &Translator, description: impl Into<String>) -> CreateReply {
    CreateReply::default()
        .embed(error_embed(tr, description))
        .ephemeral(true)
}

pub fn music_error_reply(tr: &Translator, err: &MusicError) -> CreateReply {
    error_reply(tr, music_error_message(tr, err))
}

/// Title and colour, plus the description when there is one.
pub fn simple_embed(title: impl Into<String>, description: impl Into<String>, color: u32) -> CreateEmbed {
    let description = description.into();
    let embed = CreateEmbed::new().title(title).color(color);
    if description.is_empty() {
        embed
    } else {
        embed.description(description)
    }
}

/// `█████░░░ 1:02 / 3:45`, or the live label for streams.
pub fn progress_line(tr: &Translator, position: Duration, track: &Track) -> String {
    if track.is_stream {
        return format!("🔴 {}", tr.t("player.live"));
    }
    let length = track.length();
    let ratio = if length.is_zero() {
        0.0
    } else {
        position.as_secs_f64() / length.as_secs_f64()
    };
    format!(
        "{} `{} / {}`",
        render_bar(ratio, PROGRESS_BAR_LENGTH, '█', '░'),
        format_duration(position.min(length)),
        format_duration(length)
    )
}

/// Everything the now-playing message shows.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingView {
    pub track: Track,
    pub position: Duration,
    pub volume: u16,
    pub queue_len: usize,
    pub paused: bool,
    pub loop_mode: LoopMode,
}

impl NowPlayingView {
    pub fn from_queue(queue: &GuildQueue, track: Track, position: Duration) -> Self {
        Self {
            track,
            position,
            volume: queue.volume,
            queue_len: queue.len(),
            paused: queue.paused,
            loop_mode: queue.loop_mode,
        }
    }
}

pub fn now_playing(tr: &Translator, view: &NowPlayingView) -> CreateEmbed {
    let track = &view.track;
    let status = if view.paused {
        format!("⏸️ {}", tr.t("player.status.paused"))
    } else {
        format!("▶️ {}", tr.t("player.status.playing"))
    };

    let mut embed = CreateEmbed::new()
        .title(format!("🎵 {}", tr.t("player.now_playing")))
        .description(format!(
            "**{}**\n\n{}",
            track_link(track),
            progress_line(tr, view.position, track)
        ))
        .color(COLOR_SUCCESS)
        .field(tr.t("player.artist"), &track.author, true)
        .field(tr.t("player.duration"), duration_label(tr, track), true)
        .field(tr.t("player.volume"), format!("{}%", view.volume), true)
        .field(tr.t("player.queue"), view.queue_len.to_string(), true)
        .field(tr.t("player.status.label"), status, true)
        .field(tr.t("player.requested_by"), requester(track), true)
        .footer(CreateEmbedFooter::new(tr.tf(
            "player.footer",
            &[("mode", tr.t(&format!("loop.{}", view.loop_mode.as_str())))],
        )));

    if let Some(artwork) = &track.artwork_url {
        embed = embed.thumbnail(artwork);
    }
    embed
}

pub fn track_added(tr: &Translator, track: &Track, position: usize, eta: Duration) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("➕ {}", tr.t("player.added_to_queue")))
        .description(track_link(track))
        .color(COLOR_INFO)
        .field(tr.t("player.position"), format!("#{}", position), true)
        .field(tr.t("player.duration"), duration_label(tr, track), true)
        .field(tr.t("player.requested_by"), requester(track), true)
        .field(tr.t("player.eta"), format_duration(eta), true);

    if let Some(artwork) = &track.artwork_url {
        embed = embed.thumbnail(artwork);
    }
    embed
}

pub fn started_playing(tr: &Translator, track: &Track) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("🎶 {}", tr.t("player.started")))
        .description(track_link(track))
        .color(COLOR_INFO)
        .field(tr.t("player.duration"), duration_label(tr, track), true)
        .field(tr.t("player.requested_by"), requester(track), true)
}

pub fn playlist_added(
    tr: &Translator,
    name: &str,
    tracks: &[Track],
    first_position: usize,
) -> CreateEmbed {
    let total: Duration = tracks
        .iter()
        .filter(|t| !t.is_stream)
        .map(Track::length)
        .sum();

    CreateEmbed::new()
        .title(format!("📃 {}", tr.t("player.playlist_added")))
        .description(format!("**{}**", name))
        .color(COLOR_SUCCESS)
        .field(tr.t("player.tracks"), tracks.len().to_string(), true)
        .field(tr.t("player.total_duration"), format_duration(total), true)
        .field(
            tr.t("player.position"),
            if first_position == 0 {
                tr.t("player.now")
            } else {
                format!("#{}", first_position)
            },
            true,
        )
}

/// Queue page plus the page actually shown and how many there are.
pub fn queue_view(
    tr: &Translator,
    queue: &GuildQueue,
    position: Duration,
    page: usize,
) -> (CreateEmbed, usize, usize) {
    let view = queue.page(page, QUEUE_PAGE_SIZE);
    let mut description = String::new();

    match &queue.current {
        Some(current) => {
            description.push_str(&format!("**{}**\n", tr.t("queue.now_playing")));
            description.push_str(&format!("{}\n", track_link(current)));
            description.push_str(&progress_line(tr, position, current));
            description.push_str("\n\n");
        }
        None => description.push_str(&format!("**{}**\n\n", tr.t("queue.nothing_playing"))),
    }

    if view.tracks.is_empty() {
        description.push_str(&tr.t("queue.empty"));
    } else {
        description.push_str(&format!("**{}**\n", tr.t("queue.up_next")));
        for (i, track) in view.tracks.iter().enumerate() {
            description.push_str(&format!(
                "`{}.` {} `({})`\n",
                view.offset + i,
                clip(&track.title, QUEUE_TITLE_CHARS, "…"),
                duration_label(tr, track)
            ));
        }
    }

    let remaining = queue.eta_for(queue.len() + 1, position);
    let embed = CreateEmbed::new()
        .title(format!("📜 {}", tr.t("queue.title")))
        .description(description)
        .color(COLOR_INFO)
        .field(tr.t("queue.total_tracks"), queue.len().to_string(), true)
        .field(
            tr.t("queue.total_duration"),
            format_duration(queue.total_duration()),
            true,
        )
        .field(tr.t("queue.remaining"), format_duration(remaining), true)
        .footer(CreateEmbedFooter::new(tr.tf(
            "queue.page",
            &[
                ("page", (view.page + 1).to_string()),
                ("total", view.total_pages.to_string()),
            ],
        )));

    (embed, view.page, view.total_pages)
}

pub fn queue_finished(tr: &Translator) -> CreateEmbed {
    simple_embed(
        format!("🏁 {}", tr.t("player.queue_finished.title")),
        tr.t("player.queue_finished.description"),
        COLOR_INFO,
    )
}

pub fn track_failed(tr: &Translator, track: &Track, failure: &TrackFailure) -> CreateEmbed {
    let reason = if failure.message.is_empty() {
        tr.t("player.track_failed.unknown")
    } else {
        truncate(&failure.message, 1000)
    };
    CreateEmbed::new()
        .title(format!("⚠️ {}", tr.t("player.track_failed.title")))
        .description(track_link(track))
        .color(COLOR_TRACK_FAILED)
        .field(tr.t("player.track_failed.reason"), reason, false)
        .field(
            tr.t("player.track_failed.severity"),
            if failure.severity.is_empty() {
                "-".to_string()
            } else {
                failure.severity.clone()
            },
            true,
        )
}

pub fn fell_back(tr: &Translator, failed: &Track, replacement: &Track) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("🔁 {}", tr.t("player.fallback.title")))
        .description(tr.tf(
            "player.fallback.description",
            &[
                ("failed", failed.title.clone()),
                ("replacement", track_link(replacement)),
            ],
        ))
        .color(COLOR_INFO)
}

/// Volume embed with a 20-char bar, warning above 100%.
pub fn volume_embed(tr: &Translator, volume: u16) -> CreateEmbed {
    let bar = render_bar(
        f64::from(volume) / f64::from(MAX_VOLUME),
        VOLUME_BAR_LENGTH,
        '█',
        '░',
    );
    let emoji = match volume {
        0 => "🔇",
        1..=50 => "🔉",
        _ => "🔊",
    };

    let mut embed = CreateEmbed::new()
        .title(format!("{} {}", emoji, tr.t("volume.title")))
        .description(format!("{} `{}%`", bar, volume))
        .color(COLOR_SUCCESS);
    if volume > 100 {
        embed = embed.field(tr.t("volume.warning_title"), tr.t("volume.warning"), false);
    }
    embed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::localization::Localizer;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use serenity::model::id::UserId;
    use std::sync::Arc;

    fn tr() -> Translator {
        let mut localizer = Localizer::new("en");
        localizer
            .insert_json(
                "en",
                r#"{"queue": {"page": "Page {page}/{total}", "empty": "Empty"},
                    "player": {"live": "LIVE"}}"#,
            )
            .unwrap();
        Translator::new(Arc::new(localizer), "en")
    }

    fn json(embed: CreateEmbed) -> Value {
        serde_json::to_value(embed).unwrap()
    }

    fn track(title: &str, secs: u64) -> Track {
        Track {
            title: title.to_string(),
            author: "Band".to_string(),
            length_ms: secs * 1000,
            uri: Some(format!("https://example.com/{}", secs)),
            ..Default::default()
        }
    }

    #[test]
    fn progress_line_shows_bar_and_times() {
        let line = progress_line(&tr(), Duration::from_secs(60), &track("a", 120));
        let bar: String = line.chars().take(25).collect();
        assert_eq!(bar.chars().filter(|c| *c == '█').count(), 13);
        assert!(line.ends_with("`1:00 / 2:00`"));
    }

    #[test]
    fn streams_show_live() {
        let mut stream = track("radio", 0);
        stream.is_stream = true;
        assert_eq!(progress_line(&tr(), Duration::ZERO, &stream), "🔴 LIVE");
    }

    #[test]
    fn now_playing_lists_requester_and_volume() {
        let mut t = track("Song", 200);
        t.requester = Some(UserId::new(42));
        let view = NowPlayingView {
            track: t,
            position: Duration::from_secs(10),
            volume: 80,
            queue_len: 3,
            paused: false,
            loop_mode: LoopMode::Off,
        };
        let value = json(now_playing(&tr(), &view));

        assert_eq!(value["color"], COLOR_SUCCESS);
        let fields = value["fields"].as_array().unwrap();
        assert_eq!(fields[2]["value"], "80%");
        assert_eq!(fields[3]["value"], "3");
        assert_eq!(fields[5]["value"], "<@42>");
    }

    #[test]
    fn queue_view_pages_by_ten() {
        let mut queue = GuildQueue::default();
        for i in 1..=12 {
            queue.enqueue(track(
                &format!("Track number {:02} with a really long title and more", i),
                60,
            ));
        }

        let (embed, page, total) = queue_view(&tr(), &queue, Duration::ZERO, 1);
        let value = json(embed);
        assert_eq!((page, total), (1, 2));
        let description = value["description"].as_str().unwrap();
        assert!(description.contains("`11.` Track number 11 with a really long title a… `(1:00)`"));
        assert!(!description.contains("`10.`"));
        assert_eq!(value["footer"]["text"], "Page 2/2");
    }

    #[test]
    fn empty_queue_view() {
        let (embed, page, total) = queue_view(&tr(), &GuildQueue::default(), Duration::ZERO, 5);
        assert_eq!((page, total), (0, 1));
        assert!(json(embed)["description"].as_str().unwrap().ends_with("Empty"));
    }

    #[test]
    fn volume_warns_above_hundred() {
        let loud = json(volume_embed(&tr(), 120));
        assert_eq!(loud["fields"].as_array().unwrap().len(), 1);

        let normal = json(volume_embed(&tr(), 75));
        assert!(normal.get("fields").map_or(true, |f| f.as_array().unwrap().is_empty()));
        assert!(normal["description"].as_str().unwrap().ends_with("`75%`"));
    }

    #[test]
    fn track_failed_uses_failure_color() {
        let failure = TrackFailure {
            message: "This video requires login".to_string(),
            severity: "common".to_string(),
        };
        let value = json(track_failed(&tr(), &track("a", 10), &failure));
        assert_eq!(value["color"], COLOR_TRACK_FAILED);
        assert_eq!(value["fields"][1]["value"], "common");
    }
}
