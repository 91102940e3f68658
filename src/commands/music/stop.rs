use super::*;
use crate::commands::music::utils::embedded_messages::{COLOR_SUCCESS, simple_embed};
use tracing::info;

/// Stop the music and leave the voice channel, saving the queue for /resumequeue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);
    let data = ctx.data();

    let voice_channel = data.music.voice_channel(guild_id).await;
    data.ui.clear_message(guild_id).await;
    data.lonely.cancel(guild_id);
    data.music.stop(guild_id).await?;
    if let Some(channel) = voice_channel {
        data.voice_status.clear(channel).await;
    }
    info!("Playback stopped in guild {}", guild_id);

    send_embed(
        ctx,
        simple_embed(
            format!("⏹️ {}", tr.t("player.stopped.title")),
            tr.t("player.stopped.description"),
            COLOR_SUCCESS,
        ),
        false,
    )
    .await
}
