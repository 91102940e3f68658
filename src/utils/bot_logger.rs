//! Posts audit embeds (guild joins/leaves, music starts, errors) to the log channel.

use serenity::all::{ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, Guild, Http, Timestamp};
use std::sync::Arc;
use thousands::Separable;
use tracing::{debug, warn};

use super::database::Database;
use crate::commands::music::utils::truncate;

const ERROR_MESSAGE_LIMIT: usize = 1000;

/// Plain view of a guild, detached from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct GuildSummary {
    pub id: u64,
    pub name: String,
    pub member_count: u64,
    pub owner_id: u64,
    pub created_at: String,
    pub verification_level: String,
    pub boost_level: u8,
}

impl GuildSummary {
    pub fn from_guild(guild: &Guild) -> Self {
        Self {
            id: guild.id.get(),
            name: guild.name.clone(),
            member_count: guild.member_count,
            owner_id: guild.owner_id.get(),
            created_at: format!("<t:{}:D>", guild.id.created_at().unix_timestamp()),
            verification_level: format!("{:?}", guild.verification_level),
            boost_level: u8::from(guild.premium_tier),
        }
    }
}

pub fn guild_join_embed(guild: &GuildSummary, total_guilds: usize) -> CreateEmbed {
    CreateEmbed::new()
        .title("📥 Joined a new server")
        .color(0x00FF00)
        .field("Name", &guild.name, true)
        .field("ID", guild.id.to_string(), true)
        .field("Members", guild.member_count.separate_with_commas(), true)
        .field("Owner", format!("<@{}>", guild.owner_id), true)
        .field("Created", &guild.created_at, true)
        .field("Verification", &guild.verification_level, true)
        .field("Boost level", guild.boost_level.to_string(), true)
        .field("Total servers", total_guilds.separate_with_commas(), true)
        .timestamp(Timestamp::now())
}

pub fn guild_remove_embed(guild_id: u64, name: Option<&str>, total_guilds: usize) -> CreateEmbed {
    CreateEmbed::new()
        .title("📤 Removed from a server")
        .color(0xFF0000)
        .field("Name", name.unwrap_or("Unknown"), true)
        .field("ID", guild_id.to_string(), true)
        .field("Total servers", total_guilds.separate_with_commas(), true)
        .timestamp(Timestamp::now())
}

pub fn music_start_embed(
    title: &str,
    author: &str,
    guild_name: &str,
    requester: Option<u64>,
) -> CreateEmbed {
    CreateEmbed::new()
        .title("🎵 Music started")
        .color(0x3498DB)
        .field("Track", title, false)
        .field("Artist", author, true)
        .field("Server", guild_name, true)
        .field(
            "Requested by",
            requester
                .map(|id| format!("<@{}>", id))
                .unwrap_or_else(|| "-".to_string()),
            true,
        )
        .timestamp(Timestamp::now())
}

pub fn error_embed(context: &str, message: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title("⚠️ Error")
        .color(0xFF0000)
        .field("Context", context, false)
        .description(truncate(message, ERROR_MESSAGE_LIMIT))
        .footer(CreateEmbedFooter::new("melody error log"))
        .timestamp(Timestamp::now())
}

#[derive(Clone)]
pub struct BotLogger {
    http: Arc<Http>,
    database: Database,
    channel_id: Option<ChannelId>,
}

impl BotLogger {
    pub fn new(http: Arc<Http>, database: Database, channel_id: Option<ChannelId>) -> Self {
        Self {
            http,
            database,
            channel_id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.channel_id.is_some() && self.database.logs_enabled()
    }

    /// Sends the embed when a log channel is configured and logging is enabled.
    /// Failures are only traced.
    pub async fn send(&self, embed: CreateEmbed) {
        let Some(channel_id) = self.channel_id else {
            return;
        };
        if !self.database.logs_enabled() {
            debug!("Logs disabled, dropping log embed");
            return;
        }

        if let Err(e) = channel_id
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
        {
            warn!("Failed to post log embed to {}: {}", channel_id, e);
        }
    }

    pub async fn log_error(&self, context: &str, message: &str) {
        self.send(error_embed(context, message)).await;
    }
}
