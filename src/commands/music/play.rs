use super::*;
use crate::commands::music::utils::{
    autocomplete::{MIN_QUERY_CHARS, SearchService, autocomplete_query},
    embedded_messages::{playlist_added, started_playing, track_added},
    lavalink_rest::LoadResult,
    queue_manager::Track,
};
use tracing::{debug, info};

/// Play a song or playlist from a link or a search
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"]
    #[autocomplete = "autocomplete_query"]
    query: String,
    #[description = "Where to search"] service: Option<SearchService>,
) -> CommandResult {
    info!("Received play command with query: {}", query);
    let guild_id = require_guild(ctx)?;
    let voice_channel =
        author_voice_channel(ctx, guild_id).ok_or(MusicError::UserNotInVoiceChannel)?;
    let tr = translator(ctx);
    if query.trim().chars().count() < MIN_QUERY_CHARS {
        return Err(MusicError::NoResults.into());
    }

    // Searching and connecting can take a few seconds
    ctx.defer().await?;

    let music = &ctx.data().music;
    let search = service.unwrap_or_default().query(&query);
    let result = music.nodes().search(&search).await?;
    if result.is_empty() {
        return Err(MusicError::NoResults.into());
    }

    music
        .ensure_active_player(guild_id, voice_channel, Some(ctx.channel_id()))
        .await?;

    let requester = ctx.author().id;
    match result {
        LoadResult::Playlist { name, tracks } => {
            let tracks: Vec<Track> = tracks
                .into_iter()
                .map(|t| t.with_requester(requester))
                .collect();
            debug!("Queueing playlist '{}' with {} tracks", name, tracks.len());

            let enqueued = music
                .play_or_enqueue(guild_id, tracks.clone(), Some(ctx.channel_id()))
                .await?;
            send_embed(
                ctx,
                playlist_added(&tr, &name, &tracks, enqueued.first_position),
                false,
            )
            .await
        }
        other => {
            let track = other
                .into_tracks()
                .into_iter()
                .next()
                .ok_or(MusicError::NoResults)?
                .with_requester(requester);

            let enqueued = music
                .play_or_enqueue(guild_id, vec![track.clone()], Some(ctx.channel_id()))
                .await?;
            let embed = match enqueued.started {
                Some(started) => started_playing(&tr, &started),
                None => track_added(&tr, &track, enqueued.first_position, enqueued.eta),
            };
            send_embed(ctx, embed, false).await
        }
    }
}
