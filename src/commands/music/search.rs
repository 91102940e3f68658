use super::*;
use crate::commands::music::utils::{
    button_controls::{SEARCH_CANCEL, search_controls},
    embedded_messages::{
        COLOR_INFO, COLOR_WARNING, error_embed, music_error_message, simple_embed,
        started_playing, track_added,
    },
    format_millis,
    lavalink_rest::LoadResult,
    queue_manager::Track,
    truncate,
};
use ::serenity::all::{
    ComponentInteractionDataKind, CreateInteractionResponse, EditInteractionResponse, EditMessage,
};
use std::time::Duration;
use tracing::{debug, info};

const MAX_RESULTS: usize = 25;
const SELECTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Up to 25 candidates out of a search. Playlists contribute their first tracks.
pub fn candidates(result: LoadResult) -> Vec<Track> {
    let mut tracks = match result {
        LoadResult::Playlist { tracks, .. } => tracks,
        other => other.into_tracks(),
    };
    tracks.truncate(MAX_RESULTS);
    tracks
}

pub fn results_embed(tr: &Translator, query: &str, tracks: &[Track]) -> CreateEmbed {
    let lines: Vec<String> = tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            format!(
                "`{}.` {} - {} `({})`",
                i + 1,
                truncate(&track.title, 50),
                truncate(&track.author, 40),
                format_millis(track.length_ms)
            )
        })
        .collect();

    simple_embed(
        format!("🔎 {}", tr.tf("search.title", &[("query", truncate(query, 100))])),
        truncate(&lines.join("\n"), 4000),
        COLOR_INFO,
    )
}

/// Search YouTube and pick a result from a menu
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn search(
    ctx: Context<'_>,
    #[description = "What to search for"] query: String,
) -> CommandResult {
    let guild_id = require_guild(ctx)?;
    let voice_channel =
        author_voice_channel(ctx, guild_id).ok_or(MusicError::UserNotInVoiceChannel)?;
    let tr = translator(ctx);
    ctx.defer().await?;

    let music = &ctx.data().music;
    let tracks = candidates(music.nodes().search(&format!("ytsearch:{}", query)).await?);
    if tracks.is_empty() {
        return Err(MusicError::NoResults.into());
    }

    let handle = ctx
        .send(
            CreateReply::default()
                .embed(results_embed(&tr, &query, &tracks))
                .components(search_controls(&tr, &tracks)),
        )
        .await?;
    let mut message = handle.into_message().await?;

    let interaction = message
        .await_component_interaction(ctx.serenity_context())
        .author_id(ctx.author().id)
        .timeout(SELECTION_TIMEOUT)
        .await;
    let http = &ctx.serenity_context().http;

    let Some(interaction) = interaction else {
        debug!("Search menu in guild {} expired", guild_id);
        message
            .edit(
                http,
                EditMessage::new()
                    .embed(simple_embed(
                        format!("⌛ {}", tr.t("search.expired_title")),
                        tr.t("search.expired"),
                        COLOR_WARNING,
                    ))
                    .components(Vec::new()),
            )
            .await?;
        return Ok(());
    };

    interaction
        .create_response(http, CreateInteractionResponse::Acknowledge)
        .await?;

    if interaction.data.custom_id == SEARCH_CANCEL {
        interaction
            .edit_response(
                http,
                EditInteractionResponse::new()
                    .embed(simple_embed(
                        format!("✖️ {}", tr.t("search.cancelled_title")),
                        tr.t("search.cancelled"),
                        COLOR_WARNING,
                    ))
                    .components(Vec::new()),
            )
            .await?;
        return Ok(());
    }

    let picked = match &interaction.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => values
            .first()
            .and_then(|v| v.parse::<usize>().ok())
            .and_then(|i| tracks.get(i).cloned()),
        _ => None,
    };
    let Some(track) = picked else {
        return Err(MusicError::NoResults.into());
    };
    let track = track.with_requester(ctx.author().id);
    info!("Search pick '{}' in guild {}", track.title, guild_id);

    let played = async {
        music
            .ensure_active_player(guild_id, voice_channel, Some(ctx.channel_id()))
            .await?;
        music
            .play_or_enqueue(guild_id, vec![track.clone()], Some(ctx.channel_id()))
            .await
    }
    .await;

    let embed = match played {
        Ok(enqueued) => match enqueued.started {
            Some(started) => started_playing(&tr, &started),
            None => track_added(&tr, &track, enqueued.first_position, enqueued.eta),
        },
        Err(e) => error_embed(&tr, music_error_message(&tr, &e)),
    };
    interaction
        .edit_response(
            http,
            EditInteractionResponse::new()
                .embed(embed)
                .components(Vec::new()),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::localization::Localizer;
    use fake::Fake;
    use fake::faker::lorem::en::Words;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn track(title: String) -> Track {
        Track {
            title,
            author: "Artist".into(),
            length_ms: 65_000,
            ..Default::default()
        }
    }

    #[test]
    fn playlists_are_cut_to_menu_size() {
        let tracks: Vec<Track> = (0..40)
            .map(|_| track(Words(2..4).fake::<Vec<String>>().join(" ")))
            .collect();
        let picked = candidates(LoadResult::Playlist {
            name: "Mix".into(),
            tracks,
        });
        assert_eq!(picked.len(), 25);
        assert!(candidates(LoadResult::Empty).is_empty());
    }

    #[test]
    fn results_are_numbered() {
        let tr = Translator::new(Arc::new(Localizer::new("en")), "en");
        let embed = results_embed(&tr, "q", &[track("One".into()), track("Two".into())]);
        let value = serde_json::to_value(&embed).unwrap();
        assert_eq!(
            value["description"],
            serde_json::json!("`1.` One - Artist `(1:05)`\n`2.` Two - Artist `(1:05)`")
        );
    }
}
