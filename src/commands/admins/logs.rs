use poise::CreateReply;
use ::serenity::all::CreateEmbed;
use tracing::info;

use super::is_bot_admin;
use crate::{CommandResult, Context};

/// Turn the log channel on or off. Without a value it flips the current setting.
#[poise::command(slash_command, check = "is_bot_admin", category = "Admin")]
pub async fn logs(
    ctx: Context<'_>,
    #[description = "Enable or disable logging"] enabled: Option<bool>,
) -> CommandResult {
    let data = ctx.data();
    let tr = data.translator(ctx.guild_id());

    let enabled = enabled.unwrap_or(!data.database.logs_enabled());
    data.database.set_logs_enabled(enabled)?;
    info!("Log channel {} by {}", if enabled { "enabled" } else { "disabled" }, ctx.author().id);

    let (title, color) = if enabled {
        (tr.t("logs.enabled"), 0x00ff00)
    } else {
        (tr.t("logs.disabled"), 0xffff00)
    };
    let mut embed = CreateEmbed::new().title(format!("📝 {}", title)).color(color);
    if data.config.log_channel_id.is_none() {
        embed = embed.description(tr.t("logs.no_channel"));
    }

    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
