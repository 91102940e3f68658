use super::*;
use crate::commands::music::utils::{
    embedded_messages::{COLOR_SUCCESS, simple_embed},
    clip,
};

const REMOVED_TITLE_CHARS: usize = 30;

/// Remove a track from the queue by its position
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Position of the track to remove (1-based)"]
    #[min = 1]
    position: usize,
) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);

    let track = ctx.data().music.remove(guild_id, position).await?;
    ctx.data().ui.refresh(guild_id, &tr).await;
    send_embed(
        ctx,
        simple_embed(
            format!("🗑️ {}", tr.t("queue.removed.title")),
            tr.tf(
                "queue.removed.description",
                &[
                    ("title", clip(&track.title, REMOVED_TITLE_CHARS, "...")),
                    ("position", position.to_string()),
                ],
            ),
            COLOR_SUCCESS,
        ),
        false,
    )
    .await
}
