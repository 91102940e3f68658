//! The status line Discord shows under a voice channel.

use reqwest::Client;
use serde_json::json;
use serenity::model::id::ChannelId;
use std::time::Duration;
use tracing::{debug, warn};

use super::truncate;

pub const DISCORD_API: &str = "https://discord.com/api/v10";
const STATUS_LIMIT: usize = 100;

/// `🎵 {title}`, cut to what Discord accepts.
pub fn status_text(title: &str) -> String {
    truncate(&format!("🎵 {}", title), STATUS_LIMIT)
}

#[derive(Clone)]
pub struct VoiceStatus {
    client: Client,
    base_url: String,
    token: String,
}

impl VoiceStatus {
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self::with_base_url(client, DISCORD_API.to_string(), token)
    }

    pub fn with_base_url(client: Client, base_url: String, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Sets the status; an empty string clears it. Returns whether Discord accepted it.
    pub async fn set(&self, channel_id: ChannelId, status: &str) -> bool {
        let url = format!("{}/channels/{}/voice-status", self.base_url, channel_id);
        let result = self
            .client
            .put(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "status": status }))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("Voice status of {} set to {:?}", channel_id, status);
                true
            }
            Ok(response) => {
                warn!(
                    "Discord refused voice status for {}: {}",
                    channel_id,
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("Failed to set voice status for {}: {}", channel_id, e);
                false
            }
        }
    }

    pub async fn show_track(&self, channel_id: ChannelId, title: &str) -> bool {
        self.set(channel_id, &status_text(title)).await
    }

    pub async fn clear(&self, channel_id: ChannelId) -> bool {
        self.set(channel_id, "").await
    }
}
