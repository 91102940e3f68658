use super::*;
use crate::commands::music::utils::embedded_messages::{COLOR_SUCCESS, simple_embed};
use tracing::info;

/// Skip the currently playing song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);

    let next = ctx.data().music.skip(guild_id).await?;
    let description = match next {
        Some(track) => tr.tf("player.skipped.next", &[("title", track.title)]),
        None => tr.t("player.skipped.last"),
    };
    send_embed(
        ctx,
        simple_embed(format!("⏭️ {}", tr.t("player.skipped.title")), description, COLOR_SUCCESS),
        false,
    )
    .await
}

/// Jump to a position in the queue, dropping the tracks before it
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn skipto(
    ctx: Context<'_>,
    #[description = "Queue position to jump to"]
    #[min = 1]
    position: usize,
) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);

    let track = ctx.data().music.skip_to(guild_id, position).await?;
    info!("Skipped to #{} '{}' in guild {}", position, track.title, guild_id);
    send_embed(
        ctx,
        simple_embed(
            format!("⏭️ {}", tr.t("player.skipped.title")),
            tr.tf(
                "player.skipped.to",
                &[("position", position.to_string()), ("title", track.title)],
            ),
            COLOR_SUCCESS,
        ),
        false,
    )
    .await
}
