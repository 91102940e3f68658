//! Gateway events the bot reacts to outside of commands.

use poise::serenity_prelude as serenity;
use ::serenity::all::{FullEvent, GuildId, Interaction, VoiceState};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::commands::music::utils::component_handlers;
use crate::utils::bot_logger::{GuildSummary, guild_join_embed, guild_remove_embed};
use crate::utils::presence::apply_presence;
use crate::{Data, Error};

const PRESENCE_DELAY: Duration = Duration::from_secs(1);

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            info!(
                "{} is connected to {} guild(s)",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
            data.music.nodes().log_status_panel();

            // The gateway drops presence updates sent right after identify
            let ctx = ctx.clone();
            let presence = data.database.get_presence();
            tokio::spawn(async move {
                tokio::time::sleep(PRESENCE_DELAY).await;
                apply_presence(&ctx, &presence);
            });
        }
        FullEvent::GuildCreate { guild, is_new } => {
            if *is_new == Some(true) {
                info!("Joined guild {} ({})", guild.name, guild.id);
                data.logger
                    .send(guild_join_embed(
                        &GuildSummary::from_guild(guild),
                        ctx.cache.guild_count(),
                    ))
                    .await;
            }
        }
        FullEvent::GuildDelete { incomplete, full } => {
            if !incomplete.unavailable {
                info!("Removed from guild {}", incomplete.id);
                forget_guild(data, incomplete.id).await;
                data.logger
                    .send(guild_remove_embed(
                        incomplete.id.get(),
                        full.as_ref().map(|g| g.name.as_str()),
                        ctx.cache.guild_count(),
                    ))
                    .await;
            }
        }
        FullEvent::VoiceStateUpdate { new, .. } => on_voice_state(ctx, data, new).await,
        FullEvent::InteractionCreate {
            interaction: Interaction::Component(component),
        } => {
            if let Err(e) = component_handlers::handle_interaction(ctx, data, component).await {
                error!(
                    "Error handling component {}: {}",
                    component.data.custom_id, e
                );
                data.logger
                    .log_error(&format!("component {}", component.data.custom_id), &e.to_string())
                    .await;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Drops every bit of player state the bot holds for the guild.
async fn forget_guild(data: &Data, guild_id: GuildId) {
    data.lonely.cancel(guild_id);
    data.ui.clear_message(guild_id).await;
    if data.music.is_active(guild_id).await {
        if let Err(e) = data.music.disconnect(guild_id, true).await {
            warn!("Cleanup after leaving voice in guild {} failed: {}", guild_id, e);
        }
    }
}

async fn on_voice_state(ctx: &serenity::Context, data: &Data, state: &VoiceState) {
    let Some(guild_id) = state.guild_id else {
        return;
    };

    let bot_id = ctx.cache.current_user().id;
    if state.user_id == bot_id && state.channel_id.is_none() {
        // Kicked or disconnected by someone else
        let gone = data.music.voice().current_channel(guild_id).await.is_none();
        if gone && data.music.is_active(guild_id).await && !data.music.is_rebuilding(guild_id).await {
            info!("Bot was disconnected from voice in guild {}", guild_id);
            forget_guild(data, guild_id).await;
        }
        return;
    }

    debug!("Voice state changed in guild {}", guild_id);
    data.lonely.on_voice_update(ctx, data, guild_id).await;
}
