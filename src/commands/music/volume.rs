use super::*;
use crate::commands::music::utils::embedded_messages::volume_embed;

/// Set the playback volume
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn volume(
    ctx: Context<'_>,
    #[description = "Volume from 0 to 150"]
    #[min = 0]
    #[max = 150]
    level: u16,
) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);

    let volume = ctx.data().music.set_volume(guild_id, level).await?;
    ctx.data().ui.refresh(guild_id, &tr).await;
    send_embed(ctx, volume_embed(&tr, volume), false).await
}
