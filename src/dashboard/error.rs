//! Dashboard error type and its JSON rendering.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::commands::music::utils::music_manager::MusicError;

/// Everything a dashboard handler can fail with.
///
/// Request-level failures render as `{"ok": false, "error": "<code>"}` with a
/// matching status; infrastructure failures are logged and reported as
/// `internal_error`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("missing query")]
    MissingQuery,

    #[error("voice channel required")]
    VoiceChannelRequired,

    #[error("guild not found")]
    GuildNotFound,

    #[error("invalid voice channel")]
    InvalidVoiceChannel,

    #[error("no results")]
    NoResults,

    #[error("no player")]
    NoPlayer,

    #[error("missing level")]
    MissingLevel,

    #[error("invalid level")]
    InvalidLevel,

    #[error("level must be within 0-150")]
    LevelOutOfRange,

    #[error("not logged in")]
    Unauthorized,

    #[error("OAuth state did not match")]
    CsrfMismatch,

    #[error("OAuth exchange failed: {0}")]
    OAuth(String),

    #[error("dashboard setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Music(MusicError),
}

impl From<MusicError> for AppError {
    fn from(err: MusicError) -> Self {
        match err {
            MusicError::NoPlayer | MusicError::NoTrack | MusicError::NotConnected => {
                AppError::NoPlayer
            }
            MusicError::NoResults => AppError::NoResults,
            other => AppError::Music(other),
        }
    }
}

impl AppError {
    /// Stable code sent to the browser.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingQuery => "missing_query",
            Self::VoiceChannelRequired => "voice_channel_required",
            Self::GuildNotFound => "guild_not_found",
            Self::InvalidVoiceChannel => "invalid_voice_channel",
            Self::NoResults => "no_results",
            Self::NoPlayer => "no_player",
            Self::MissingLevel => "missing_level",
            Self::InvalidLevel => "invalid_level",
            Self::LevelOutOfRange => "range_0_150",
            Self::Unauthorized => "unauthorized",
            Self::CsrfMismatch => "csrf_mismatch",
            Self::OAuth(_) => "oauth_failed",
            Self::Setup(_) | Self::Session(_) | Self::Http(_) | Self::Music(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingQuery
            | Self::VoiceChannelRequired
            | Self::InvalidVoiceChannel
            | Self::MissingLevel
            | Self::InvalidLevel
            | Self::LevelOutOfRange
            | Self::CsrfMismatch => StatusCode::BAD_REQUEST,
            Self::GuildNotFound | Self::NoResults | Self::NoPlayer => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::OAuth(_) => StatusCode::BAD_GATEWAY,
            Self::Setup(_) | Self::Session(_) | Self::Http(_) | Self::Music(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            error!("Dashboard request failed: {}", self);
        }
        (status, Json(json!({ "ok": false, "error": self.code() }))).into_response()
    }
}
