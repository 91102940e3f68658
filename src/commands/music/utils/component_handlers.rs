use ::serenity::all::{
    ChannelId, ComponentInteraction, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseMessage, GuildId,
};
use poise::serenity_prelude as serenity;
use tracing::{debug, error, info};

use super::button_controls::*;
use super::embedded_messages::{
    COLOR_INFO, COLOR_SUCCESS, music_error_message, queue_view, simple_embed, volume_embed,
};
use super::filters::FilterPreset;
use super::music_manager::MusicError;
use super::user_voice_channel;
use crate::commands::music::lyrics::{lyrics_outcome_embed, show_lyrics};
use crate::utils::localization::Translator;
use crate::{Data, Error};

const VOLUME_STEP: i32 = 10;

type ButtonInteractionResult = Result<(), Error>;

/// The bot has to be connected and the user in the same voice channel.
pub fn check_access(
    bot_channel: Option<ChannelId>,
    user_channel: Option<ChannelId>,
) -> Result<ChannelId, MusicError> {
    let bot_channel = bot_channel.ok_or(MusicError::NotConnected)?;
    let user_channel = user_channel.ok_or(MusicError::UserNotInVoiceChannel)?;
    if bot_channel != user_channel {
        return Err(MusicError::NotSameChannel);
    }
    Ok(bot_channel)
}

async fn respond(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
    response: CreateInteractionResponse,
) -> ButtonInteractionResult {
    interaction.create_response(&ctx.http, response).await?;
    Ok(())
}

async fn reply(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
    embed: CreateEmbed,
) -> ButtonInteractionResult {
    respond(
        ctx,
        interaction,
        CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .embed(embed)
                .ephemeral(true),
        ),
    )
    .await
}

async fn error_reply(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
    tr: &Translator,
    err: &MusicError,
) -> ButtonInteractionResult {
    reply(
        ctx,
        interaction,
        super::embedded_messages::error_embed(tr, music_error_message(tr, err)),
    )
    .await
}

/// Entry point for every button and select menu the bot owns.
pub async fn handle_interaction(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
) -> ButtonInteractionResult {
    let custom_id = interaction.data.custom_id.as_str();
    // Search menus are answered by the collector of the /search that posted them.
    if custom_id == SEARCH_SELECT || custom_id == SEARCH_CANCEL {
        return Ok(());
    }

    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };
    let tr = data.translator(Some(guild_id));
    debug!("Component {} pressed in guild {}", custom_id, guild_id);

    if custom_id == LYRICS_STOP {
        return handle_lyrics_stop(ctx, data, interaction, &tr).await;
    }

    let access = check_access(
        data.music.voice().current_channel(guild_id).await,
        user_voice_channel(&ctx.cache, guild_id, interaction.user.id),
    );
    if let Err(e) = access {
        return error_reply(ctx, interaction, &tr, &e).await;
    }

    if let Some((action, page)) = parse_page_id(custom_id) {
        return handle_queue_page(ctx, data, interaction, &tr, guild_id, action, page).await;
    }
    if custom_id == FILTER_RESET || custom_id.starts_with("filter_") {
        return handle_filter(ctx, data, interaction, &tr, guild_id).await;
    }

    let result = match custom_id {
        MUSIC_PREVIOUS => handle_previous(ctx, data, interaction, &tr, guild_id).await,
        MUSIC_PLAY_PAUSE => handle_play_pause(ctx, data, interaction, &tr, guild_id).await,
        MUSIC_STOP => handle_stop(ctx, data, interaction, &tr, guild_id).await,
        MUSIC_SKIP => handle_skip(ctx, data, interaction, &tr, guild_id).await,
        MUSIC_SHUFFLE => handle_shuffle(ctx, data, interaction, &tr, guild_id).await,
        MUSIC_VOLUME_DOWN => {
            handle_volume(ctx, data, interaction, &tr, guild_id, -VOLUME_STEP).await
        }
        MUSIC_VOLUME_UP => handle_volume(ctx, data, interaction, &tr, guild_id, VOLUME_STEP).await,
        MUSIC_LOOP => handle_loop(ctx, data, interaction, &tr, guild_id).await,
        MUSIC_QUEUE => handle_queue_page(ctx, data, interaction, &tr, guild_id, MUSIC_QUEUE, 0).await,
        MUSIC_LYRICS => handle_lyrics(ctx, data, interaction, &tr, guild_id).await,
        other => {
            error!("Unknown component id: {}", other);
            Ok(())
        }
    };

    match result {
        Err(e) => match e.downcast_ref::<MusicError>() {
            Some(music_error) => error_reply(ctx, interaction, &tr, music_error).await,
            None => Err(e),
        },
        ok => ok,
    }
}

/// Redraws the player message: in place when the button sits on it, otherwise with
/// a short ephemeral note.
async fn update_player(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
    note: CreateEmbed,
) -> ButtonInteractionResult {
    let on_player = data
        .ui
        .message(guild_id)
        .is_some_and(|m| m.message_id == interaction.message.id);

    if on_player {
        if let Some((embed, components)) = data.ui.render(guild_id, tr).await {
            return respond(
                ctx,
                interaction,
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .embed(embed)
                        .components(components),
                ),
            )
            .await;
        }
    }

    data.ui.refresh(guild_id, tr).await;
    reply(ctx, interaction, note).await
}

async fn handle_previous(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
) -> ButtonInteractionResult {
    let restarted = data.music.restart_or_previous(guild_id).await?;
    let embed = if restarted {
        simple_embed(
            format!("⏮️ {}", tr.t("player.previous.title")),
            tr.t("player.previous.restarted"),
            COLOR_SUCCESS,
        )
    } else {
        simple_embed(
            format!("⏮️ {}", tr.t("player.previous.title")),
            tr.t("player.previous.none"),
            COLOR_INFO,
        )
    };
    reply(ctx, interaction, embed).await
}

async fn handle_play_pause(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
) -> ButtonInteractionResult {
    let paused = data.music.toggle_pause(guild_id).await?;
    let note = if paused {
        simple_embed(format!("⏸️ {}", tr.t("player.paused")), "", COLOR_SUCCESS)
    } else {
        simple_embed(format!("▶️ {}", tr.t("player.resumed")), "", COLOR_SUCCESS)
    };
    update_player(ctx, data, interaction, tr, guild_id, note).await
}

async fn handle_stop(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
) -> ButtonInteractionResult {
    let channel = data.music.voice_channel(guild_id).await;
    data.ui.clear_message(guild_id).await;
    data.lonely.cancel(guild_id);
    data.music.stop(guild_id).await?;
    if let Some(channel) = channel {
        data.voice_status.clear(channel).await;
    }
    info!("Player stopped from button in guild {}", guild_id);

    reply(
        ctx,
        interaction,
        simple_embed(
            format!("⏹️ {}", tr.t("player.stopped.title")),
            tr.t("player.stopped.description"),
            COLOR_SUCCESS,
        ),
    )
    .await
}

async fn handle_skip(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
) -> ButtonInteractionResult {
    let next = data.music.skip(guild_id).await?;
    let description = match next {
        Some(track) => tr.tf("player.skipped.next", &[("title", track.title)]),
        None => tr.t("player.skipped.last"),
    };
    reply(
        ctx,
        interaction,
        simple_embed(format!("⏭️ {}", tr.t("player.skipped.title")), description, COLOR_SUCCESS),
    )
    .await
}

async fn handle_shuffle(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
) -> ButtonInteractionResult {
    let count = data.music.shuffle(guild_id).await?;
    let note = simple_embed(
        format!("🔀 {}", tr.t("queue.shuffled.title")),
        tr.tf("queue.shuffled.description", &[("count", count.to_string())]),
        COLOR_SUCCESS,
    );
    update_player(ctx, data, interaction, tr, guild_id, note).await
}

async fn handle_volume(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
    delta: i32,
) -> ButtonInteractionResult {
    let volume = data.music.change_volume(guild_id, delta).await?;
    data.ui.refresh(guild_id, tr).await;
    reply(ctx, interaction, volume_embed(tr, volume)).await
}

async fn handle_loop(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
) -> ButtonInteractionResult {
    let mode = data.music.cycle_loop(guild_id).await?;
    let note = simple_embed(
        format!("🔁 {}", tr.t("loop.title")),
        tr.tf(
            "loop.changed",
            &[("mode", tr.t(&format!("loop.{}", mode.as_str())))],
        ),
        COLOR_SUCCESS,
    );
    update_player(ctx, data, interaction, tr, guild_id, note).await
}

/// Queue button, and the page buttons under a queue view.
async fn handle_queue_page(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
    action: &str,
    page: usize,
) -> ButtonInteractionResult {
    let Some(queue) = data.music.queue(guild_id).await else {
        return error_reply(ctx, interaction, tr, &MusicError::NoPlayer).await;
    };
    let position = data.music.position(guild_id).await;

    let requested = match action {
        QUEUE_PREV_PAGE => page.saturating_sub(1),
        QUEUE_NEXT_PAGE => page + 1,
        _ => page,
    };
    let (embed, page, total) = queue_view(tr, &queue, position, requested);
    let message = CreateInteractionResponseMessage::new()
        .embed(embed)
        .components(queue_controls(tr, page, total, queue.paused, queue.loop_mode));

    let response = if action == MUSIC_QUEUE {
        CreateInteractionResponse::Message(message.ephemeral(true))
    } else {
        data.ui.set_queue_page(interaction.message.id, page);
        CreateInteractionResponse::UpdateMessage(message)
    };
    respond(ctx, interaction, response).await
}

async fn handle_filter(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
) -> ButtonInteractionResult {
    let custom_id = interaction.data.custom_id.as_str();

    let result = if custom_id == FILTER_RESET {
        data.music.reset_filters(guild_id).await.map(|_| None)
    } else {
        match FilterPreset::from_custom_id(custom_id) {
            Some(preset) => data.music.toggle_filter(guild_id, preset).await,
            None => {
                error!("Unknown filter button: {}", custom_id);
                return Ok(());
            }
        }
    };

    let active = match result {
        Ok(active) => active,
        Err(e) => return error_reply(ctx, interaction, tr, &e).await,
    };
    let description = match active {
        Some(preset) => tr.tf(
            "filters.enabled",
            &[("filter", tr.t(&format!("filters.{}", preset.key())))],
        ),
        None => tr.t("filters.cleared"),
    };

    respond(
        ctx,
        interaction,
        CreateInteractionResponse::UpdateMessage(
            CreateInteractionResponseMessage::new()
                .embed(simple_embed(
                    format!("🎛️ {}", tr.t("filters.title")),
                    description,
                    COLOR_INFO,
                ))
                .components(filter_controls(tr, active)),
        ),
    )
    .await
}

async fn handle_lyrics(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
    guild_id: GuildId,
) -> ButtonInteractionResult {
    interaction.defer_ephemeral(&ctx.http).await?;
    let outcome = show_lyrics(data, ctx.http.clone(), guild_id, interaction.channel_id, tr).await;
    interaction
        .create_followup(
            &ctx.http,
            serenity::CreateInteractionResponseFollowup::new()
                .embed(lyrics_outcome_embed(tr, &outcome))
                .ephemeral(true),
        )
        .await?;
    Ok(())
}

async fn handle_lyrics_stop(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
    tr: &Translator,
) -> ButtonInteractionResult {
    let stopped = data.lyrics_sessions.cancel(interaction.channel_id);
    debug!(
        "Lyrics stop in channel {}: session was {}",
        interaction.channel_id,
        if stopped { "running" } else { "idle" }
    );

    respond(
        ctx,
        interaction,
        CreateInteractionResponse::UpdateMessage(
            CreateInteractionResponseMessage::new()
                .embed(simple_embed(
                    format!("⏹️ {}", tr.t("lyrics.stopped.title")),
                    tr.t("lyrics.stopped.description"),
                    COLOR_INFO,
                ))
                .components(Vec::new()),
        ),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn access_needs_bot_connected() {
        assert_matches!(
            check_access(None, Some(ChannelId::new(1))),
            Err(MusicError::NotConnected)
        );
    }

    #[test]
    fn access_needs_user_in_voice() {
        assert_matches!(
            check_access(Some(ChannelId::new(1)), None),
            Err(MusicError::UserNotInVoiceChannel)
        );
    }

    #[test]
    fn access_needs_same_channel() {
        assert_matches!(
            check_access(Some(ChannelId::new(1)), Some(ChannelId::new(2))),
            Err(MusicError::NotSameChannel)
        );
        assert_matches!(
            check_access(Some(ChannelId::new(3)), Some(ChannelId::new(3))),
            Ok(channel) if channel == ChannelId::new(3)
        );
    }
}
