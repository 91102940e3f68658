//! This module aggregates all the command modules for the bot.

/// Bot-admin commands (presence, log channel).
pub(crate) mod admins;
/// General purpose commands (ping, help, language).
pub(crate) mod general;
/// Music playback through Lavalink.
pub mod music;

use crate::{Data, Error};

/// Every command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    let mut commands = vec![
        // General commands
        general::help::help(),
        general::ping::ping(),
        general::language::language(),
        // Admin commands
        admins::presence::admin(),
        admins::logs::logs(),
    ];
    commands.extend(music::commands());
    commands
}
