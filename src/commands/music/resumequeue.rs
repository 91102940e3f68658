use super::*;
use crate::commands::music::utils::embedded_messages::{
    COLOR_ERROR, COLOR_WARNING, simple_embed,
};
use tracing::{info, warn};

const COLOR_RESUMED: u32 = 0x57F287;

/// Whether the bot may connect and speak in `channel_id`. Unknown means yes.
fn bot_can_join(ctx: Context<'_>, guild_id: GuildId, channel_id: ChannelId) -> bool {
    let cache = &ctx.serenity_context().cache;
    let bot_id = cache.current_user().id;
    let Some(guild) = cache.guild(guild_id) else {
        return true;
    };
    let (Some(channel), Some(member)) = (guild.channels.get(&channel_id), guild.members.get(&bot_id))
    else {
        return true;
    };
    let permissions = guild.user_permissions_in(channel, member);
    permissions.connect() && permissions.speak()
}

/// Bring back the queue saved when the bot last left
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn resumequeue(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_guild(ctx)?;
    let voice_channel =
        author_voice_channel(ctx, guild_id).ok_or(MusicError::UserNotInVoiceChannel)?;
    let tr = translator(ctx);
    let music = &ctx.data().music;

    if !bot_can_join(ctx, guild_id, voice_channel) {
        return send_embed(
            ctx,
            simple_embed(
                format!("❌ {}", tr.t("errors.title")),
                tr.t("resume.missing_permissions"),
                COLOR_ERROR,
            ),
            true,
        )
        .await;
    }
    if music.saved_queue(guild_id)?.is_none_or(|saved| saved.is_empty()) {
        return send_embed(
            ctx,
            simple_embed(
                format!("📭 {}", tr.t("resume.title")),
                tr.t("resume.nothing_saved"),
                COLOR_WARNING,
            ),
            true,
        )
        .await;
    }

    ctx.defer().await?;
    if !music.nodes().ensure_connected().await {
        return Err(MusicError::NoNodesAvailable.into());
    }

    let restored = match music
        .restore_saved_queue(guild_id, voice_channel, Some(ctx.channel_id()))
        .await
    {
        Ok(restored) => restored,
        Err(MusicError::NoResults) => {
            warn!("None of the saved tracks for guild {} could be loaded", guild_id);
            return send_embed(
                ctx,
                simple_embed(
                    format!("❌ {}", tr.t("resume.title")),
                    tr.t("resume.failed"),
                    COLOR_ERROR,
                ),
                false,
            )
            .await;
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        "Restored {} saved track(s) in guild {} ({} skipped)",
        restored.restored, guild_id, restored.skipped
    );

    let mut embed = simple_embed(
        format!("▶️ {}", tr.t("resume.title")),
        tr.tf(
            "resume.success",
            &[
                ("count", restored.restored.to_string()),
                ("skipped", restored.skipped.to_string()),
            ],
        ),
        COLOR_RESUMED,
    )
    .field(tr.t("player.queue"), restored.queue_len.to_string(), true);
    if let Some(first) = &restored.first {
        embed = embed.field(tr.t("resume.first"), first.title.clone(), true);
    }
    send_embed(ctx, embed, false).await
}
