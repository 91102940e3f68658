use super::*;
use crate::commands::music::utils::button_controls::lyrics_controls;
use crate::commands::music::utils::embedded_messages::{
    COLOR_ERROR, COLOR_INFO, COLOR_WARNING, simple_embed,
};
use crate::commands::music::utils::lyrics::{
    LYRICS_COLOR, LyricsSync, line_index, lyrics_embed, render_window,
};
use ::serenity::all::{CreateMessage, Http};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LyricsOutcome {
    Synced { title: String },
    Plain { title: String },
    AlreadyActive,
    NothingPlaying,
    NotFound { title: String },
    Unavailable,
}

pub fn lyrics_outcome_embed(tr: &Translator, outcome: &LyricsOutcome) -> CreateEmbed {
    let title = format!("🎤 {}", tr.t("lyrics.header"));
    match outcome {
        LyricsOutcome::Synced { title: track } => simple_embed(
            title,
            tr.tf("lyrics.synced", &[("title", track.clone())]),
            LYRICS_COLOR,
        ),
        LyricsOutcome::Plain { title: track } => simple_embed(
            title,
            tr.tf("lyrics.plain", &[("title", track.clone())]),
            COLOR_INFO,
        ),
        LyricsOutcome::AlreadyActive => {
            simple_embed(title, tr.t("lyrics.already_active"), COLOR_WARNING)
        }
        LyricsOutcome::NothingPlaying => {
            simple_embed(title, tr.t("errors.no_track"), COLOR_ERROR)
        }
        LyricsOutcome::NotFound { title: track } => simple_embed(
            title,
            tr.tf("lyrics.not_found", &[("title", track.clone())]),
            COLOR_WARNING,
        ),
        LyricsOutcome::Unavailable => simple_embed(title, tr.t("lyrics.unavailable"), COLOR_ERROR),
    }
}

/// Looks up the current track's lyrics and posts them in `channel_id`. Synced lyrics
/// keep following the track until it changes or someone presses stop.
pub async fn show_lyrics(
    data: &Data,
    http: Arc<Http>,
    guild_id: GuildId,
    channel_id: ChannelId,
    tr: &Translator,
) -> LyricsOutcome {
    let Some(track) = data.music.current_track(guild_id).await else {
        return LyricsOutcome::NothingPlaying;
    };
    let Some(cancelled) = data.lyrics_sessions.try_start(channel_id) else {
        return LyricsOutcome::AlreadyActive;
    };

    let lyrics = match data.lyrics.fetch(&track).await {
        Ok(Some(lyrics)) => lyrics,
        Ok(None) => {
            data.lyrics_sessions.finish(channel_id);
            return LyricsOutcome::NotFound { title: track.title };
        }
        Err(e) => {
            warn!("Lyrics lookup for '{}' failed: {}", track.title, e);
            data.lyrics_sessions.finish(channel_id);
            return LyricsOutcome::Unavailable;
        }
    };

    let synced = lyrics.is_synced();
    let (description, components) = if synced {
        let position = data.music.position(guild_id).await;
        let index = line_index(&lyrics.lines, position).unwrap_or_default();
        (render_window(&lyrics.lines, index), lyrics_controls(tr))
    } else {
        (lyrics.text.clone(), Vec::new())
    };

    let message = channel_id
        .send_message(
            &http,
            CreateMessage::new()
                .embed(lyrics_embed(tr, &lyrics, &track, &description))
                .components(components),
        )
        .await;
    let message = match message {
        Ok(message) => message,
        Err(e) => {
            warn!("Failed to post lyrics in channel {}: {}", channel_id, e);
            data.lyrics_sessions.finish(channel_id);
            return LyricsOutcome::Unavailable;
        }
    };

    let title = track.title.clone();
    if !synced {
        data.lyrics_sessions.finish(channel_id);
        return LyricsOutcome::Plain { title };
    }

    info!("Starting synced lyrics for '{}' in channel {}", title, channel_id);
    LyricsSync {
        http,
        music: data.music.clone(),
        sessions: data.lyrics_sessions.clone(),
        guild_id,
        channel_id,
        message_id: message.id,
        track,
        lyrics,
        tr: tr.clone(),
        cancelled,
    }
    .spawn();

    LyricsOutcome::Synced { title }
}

/// Show the lyrics of the current track
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn lyrics(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_guild(ctx)?;
    let tr = translator(ctx);
    ctx.defer_ephemeral().await?;

    let outcome = show_lyrics(
        ctx.data(),
        ctx.serenity_context().http.clone(),
        guild_id,
        ctx.channel_id(),
        &tr,
    )
    .await;
    send_embed(ctx, lyrics_outcome_embed(&tr, &outcome), true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::localization::Localizer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tr() -> Translator {
        let mut localizer = Localizer::new("en");
        localizer
            .insert_json(
                "en",
                r#"{"lyrics": {"header": "Lyrics", "not_found": "No lyrics for {title}"}}"#,
            )
            .unwrap();
        Translator::new(Arc::new(localizer), "en")
    }

    #[test]
    fn not_found_names_the_track() {
        let embed = lyrics_outcome_embed(
            &tr(),
            &LyricsOutcome::NotFound {
                title: "Song".into(),
            },
        );
        let value = serde_json::to_value(&embed).unwrap();
        assert_eq!(value["title"], json!("🎤 Lyrics"));
        assert_eq!(value["description"], json!("No lyrics for Song"));
        assert_eq!(value["color"], json!(COLOR_WARNING));
    }
}
