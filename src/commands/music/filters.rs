use super::*;
use crate::commands::music::utils::{
    button_controls::filter_controls,
    embedded_messages::{COLOR_INFO, COLOR_SUCCESS, simple_embed},
    filters::{BassBoostLevel, FilterPreset},
};
use ::serenity::all::EditMessage;
use std::time::Duration;
use tracing::debug;

const PANEL_LIFETIME: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum BassBoostChoice {
    #[name = "high"]
    High,
    #[name = "medium"]
    Medium,
    #[name = "low"]
    Low,
    #[name = "off"]
    Off,
}

impl BassBoostChoice {
    pub fn level(&self) -> Option<BassBoostLevel> {
        match self {
            BassBoostChoice::High => Some(BassBoostLevel::High),
            BassBoostChoice::Medium => Some(BassBoostLevel::Medium),
            BassBoostChoice::Low => Some(BassBoostLevel::Low),
            BassBoostChoice::Off => None,
        }
    }
}

fn active_label(tr: &Translator, active: Option<FilterPreset>) -> String {
    match active {
        Some(preset) => tr.tf(
            "filters.enabled",
            &[("filter", tr.t(&format!("filters.{}", preset.key())))],
        ),
        None => tr.t("filters.none"),
    }
}

/// Open the audio filter panel
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn filters(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);

    let queue = ctx.data().music.queue(guild_id).await.ok_or(MusicError::NoPlayer)?;
    if queue.current.is_none() {
        return Err(MusicError::NoTrack.into());
    }

    let handle = ctx
        .send(
            CreateReply::default()
                .embed(simple_embed(
                    format!("🎛️ {}", tr.t("filters.title")),
                    active_label(&tr, queue.active_filter),
                    COLOR_INFO,
                ))
                .components(filter_controls(&tr, queue.active_filter)),
        )
        .await?;

    // The panel buttons stop working once the panel expires
    let message = handle.message().await?;
    let (channel_id, message_id) = (message.channel_id, message.id);
    let http = ctx.serenity_context().http.clone();
    tokio::spawn(async move {
        tokio::time::sleep(PANEL_LIFETIME).await;
        if let Err(e) = channel_id
            .edit_message(&http, message_id, EditMessage::new().components(Vec::new()))
            .await
        {
            debug!("Could not expire filter panel {}: {}", message_id, e);
        }
    });
    Ok(())
}

/// Boost the bass of the current track
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn bassboost(
    ctx: Context<'_>,
    #[description = "Boost level"] level: BassBoostChoice,
) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);

    let level = level.level();
    ctx.data().music.set_bass_boost(guild_id, level).await?;
    let description = match level {
        Some(level) => tr.tf("filters.bass_boost_set", &[("level", level.as_str().to_string())]),
        None => tr.t("filters.cleared"),
    };
    send_embed(
        ctx,
        simple_embed(format!("🔊 {}", tr.t("filters.bass_boost")), description, COLOR_SUCCESS),
        false,
    )
    .await
}

/// Remove every audio filter
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn resetfilters(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_same_channel(ctx).await?;
    let tr = translator(ctx);

    ctx.data().music.reset_filters(guild_id).await?;
    send_embed(
        ctx,
        simple_embed(
            format!("♻️ {}", tr.t("filters.reset")),
            tr.t("filters.cleared"),
            COLOR_SUCCESS,
        ),
        false,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn off_clears_the_boost() {
        assert_eq!(BassBoostChoice::Off.level(), None);
        assert_eq!(BassBoostChoice::High.level(), Some(BassBoostLevel::High));
    }
}
