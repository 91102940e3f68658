pub(crate) mod filters;
pub(crate) mod lyrics;
pub(crate) mod pause;
pub(crate) mod play;
pub(crate) mod queue;
pub(crate) mod remove;
pub(crate) mod resumequeue;
pub(crate) mod search;
pub(crate) mod seek;
pub(crate) mod skip;
pub(crate) mod stop;
pub(crate) mod volume;

pub mod utils;

use crate::utils::localization::Translator;
use crate::{CommandResult, Context, Data, Error};
use ::serenity::all::{ChannelId, CreateEmbed, GuildId};
use poise::CreateReply;
use utils::component_handlers::check_access;
use utils::music_manager::MusicError;
use utils::user_voice_channel;

/// Every music command, in registration order.
pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        play::play(),
        search::search(),
        pause::pause(),
        skip::skip(),
        skip::skipto(),
        stop::stop(),
        volume::volume(),
        seek::seek(),
        queue::queue(),
        queue::clear(),
        queue::clearqueue(),
        queue::shuffle(),
        remove::remove(),
        filters::filters(),
        filters::bassboost(),
        filters::resetfilters(),
        lyrics::lyrics(),
        resumequeue::resumequeue(),
    ]
}

fn translator(ctx: Context<'_>) -> Translator {
    ctx.data().translator(ctx.guild_id())
}

fn require_guild(ctx: Context<'_>) -> Result<GuildId, MusicError> {
    ctx.guild_id().ok_or(MusicError::NotInGuild)
}

fn author_voice_channel(ctx: Context<'_>, guild_id: GuildId) -> Option<ChannelId> {
    user_voice_channel(&ctx.serenity_context().cache, guild_id, ctx.author().id)
}

/// Guild of a command that drives a running player: the bot is connected and the
/// author sits in the same voice channel.
async fn require_same_channel(ctx: Context<'_>) -> Result<GuildId, MusicError> {
    let guild_id = require_guild(ctx)?;
    check_access(
        ctx.data().music.voice().current_channel(guild_id).await,
        author_voice_channel(ctx, guild_id),
    )?;
    Ok(guild_id)
}

async fn send_embed(ctx: Context<'_>, embed: CreateEmbed, ephemeral: bool) -> CommandResult {
    ctx.send(CreateReply::default().embed(embed).ephemeral(ephemeral))
        .await?;
    Ok(())
}
