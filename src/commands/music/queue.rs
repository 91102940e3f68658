use super::*;
use crate::commands::music::utils::{
    button_controls::queue_controls,
    embedded_messages::{COLOR_SUCCESS, COLOR_WARNING, queue_view, simple_embed},
    event_handlers::PlayerUi,
};
use ::serenity::all::{EditMessage, MessageId};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const LIVE_REFRESH: Duration = Duration::from_secs(10);

/// Keeps a `/queue` message current until the queue runs dry or the message goes away.
fn spawn_live_queue(
    ui: Arc<PlayerUi>,
    guild_id: GuildId,
    channel_id: ChannelId,
    message_id: MessageId,
    tr: Translator,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(LIVE_REFRESH).await;

            let Some(page) = ui.queue_view_page(message_id) else {
                break;
            };
            let Some(queue) = ui.music().queue(guild_id).await else {
                break;
            };
            if queue.current.is_none() && queue.is_empty() {
                break;
            }

            let position = ui.music().position(guild_id).await;
            let (embed, page, total) = queue_view(&tr, &queue, position, page);
            let edit = EditMessage::new()
                .embed(embed)
                .components(queue_controls(&tr, page, total, queue.paused, queue.loop_mode));
            if let Err(e) = channel_id.edit_message(ui.http(), message_id, edit).await {
                debug!("Live queue message {} stopped updating: {}", message_id, e);
                break;
            }
        }
        ui.drop_queue_view(message_id);
    });
}

/// View the current music queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn queue(
    ctx: Context<'_>,
    #[description = "Page to show"]
    #[min = 1]
    page: Option<usize>,
) -> CommandResult {
    let guild_id = require_guild(ctx)?;
    let tr = translator(ctx);
    let data = ctx.data();

    let queue = data.music.queue(guild_id).await.ok_or(MusicError::NoPlayer)?;
    let position = data.music.position(guild_id).await;
    let requested = page.unwrap_or(1).saturating_sub(1);
    let (embed, page, total) = queue_view(&tr, &queue, position, requested);

    let handle = ctx
        .send(
            CreateReply::default()
                .embed(embed)
                .components(queue_controls(&tr, page, total, queue.paused, queue.loop_mode)),
        )
        .await?;

    if queue.current.is_some() || !queue.is_empty() {
        let message = handle.message().await?;
        data.ui.track_queue_view(message.id, page);
        spawn_live_queue(data.ui.clone(), guild_id, message.channel_id, message.id, tr);
    }
    Ok(())
}

async fn clear_upcoming(ctx: Context<'_>, detailed: bool) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);
    let data = ctx.data();

    let cleared = data.music.clear(guild_id).await?;
    let current = data.music.current_track(guild_id).await;

    let embed = if cleared == 0 {
        let mut embed = simple_embed(
            format!("📭 {}", tr.t("queue.clear.empty_title")),
            tr.t("queue.clear.empty_description"),
            COLOR_WARNING,
        );
        if let Some(current) = current.filter(|_| detailed) {
            embed = embed.field(
                tr.t("queue.clear.current_label"),
                tr.tf("queue.clear.current_value", &[("title", current.title)]),
                false,
            );
        }
        embed
    } else {
        let mut embed = simple_embed(
            format!("🗑️ {}", tr.t("queue.clear.title")),
            tr.tf("queue.clear.description", &[("count", cleared.to_string())]),
            COLOR_SUCCESS,
        );
        if detailed {
            embed = embed
                .field(tr.t("queue.clear.removed"), cleared.to_string(), true)
                .field(tr.t("queue.clear.status"), tr.t("queue.clear.status_value"), true);
        }
        embed
    };

    data.ui.refresh(guild_id, &tr).await;
    send_embed(ctx, embed, false).await
}

/// Clear the upcoming tracks
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn clear(ctx: Context<'_>) -> CommandResult {
    clear_upcoming(ctx, false).await
}

/// Clear every track waiting in the queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn clearqueue(ctx: Context<'_>) -> CommandResult {
    clear_upcoming(ctx, true).await
}

/// Shuffle the upcoming tracks
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn shuffle(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);

    let count = ctx.data().music.shuffle(guild_id).await?;
    ctx.data().ui.refresh(guild_id, &tr).await;
    send_embed(
        ctx,
        simple_embed(
            format!("🔀 {}", tr.t("queue.shuffled.title")),
            tr.tf("queue.shuffled.description", &[("count", count.to_string())]),
            COLOR_SUCCESS,
        ),
        false,
    )
    .await
}
