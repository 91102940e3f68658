use super::*;
use crate::commands::music::utils::embedded_messages::{COLOR_SUCCESS, simple_embed};

/// Pause or resume the current track
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn pause(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);
    let data = ctx.data();

    let paused = data.music.toggle_pause(guild_id).await?;
    data.ui.refresh(guild_id, &tr).await;

    let embed = if paused {
        simple_embed(format!("⏸️ {}", tr.t("player.paused")), "", COLOR_SUCCESS)
    } else {
        simple_embed(format!("▶️ {}", tr.t("player.resumed")), "", COLOR_SUCCESS)
    };
    send_embed(ctx, embed, false).await
}
