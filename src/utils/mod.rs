//! This module aggregates various utility submodules used throughout the application.

/// Log-channel embeds (guild joins, music starts, errors).
pub mod bot_logger;
/// Utilities for interacting with the application's SQLite database.
pub mod database;
/// Locale files and per-guild translation.
pub mod localization;
/// Bot status and activity.
pub mod presence;
