use super::*;
use crate::commands::music::utils::{
    embedded_messages::{COLOR_SUCCESS, simple_embed},
    format_duration, format_millis, parse_seek,
};

/// Jump to a time in the current track (90, 1:30, 1:02:03 or 1h2m3s)
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn seek(
    ctx: Context<'_>,
    #[description = "Where to jump, e.g. 1:30"] position: String,
) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);

    let target = parse_seek(&position).ok_or(MusicError::InvalidPosition)?;
    let track = ctx
        .data()
        .music
        .current_track(guild_id)
        .await
        .ok_or(MusicError::NoTrack)?;
    let target = ctx.data().music.seek(guild_id, target).await?;
    ctx.data().ui.refresh(guild_id, &tr).await;

    send_embed(
        ctx,
        simple_embed(
            format!("⏩ {}", tr.t("player.seek.title")),
            tr.tf(
                "player.seek.description",
                &[
                    ("position", format_duration(target)),
                    ("duration", format_millis(track.length_ms)),
                ],
            ),
            COLOR_SUCCESS,
        ),
        false,
    )
    .await
}
