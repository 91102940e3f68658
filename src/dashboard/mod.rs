//! Web panel for controlling playback from a browser, behind Discord login.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_sessions::{MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing::{info, warn};

pub use error::AppError;
pub use state::AppState;

use crate::Error;

/// Origin the panel is served from, taken from the OAuth redirect URI.
pub fn panel_origin(redirect_uri: &str) -> Option<HeaderValue> {
    let url = url::Url::parse(redirect_uri).ok()?;
    HeaderValue::from_str(&url.origin().ascii_serialization()).ok()
}

pub fn router(state: AppState) -> Router {
    let secure = state.config.redirect_uri.starts_with("https://");
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(secure)
        .with_same_site(SameSite::Lax);

    let origins = match panel_origin(&state.config.redirect_uri) {
        Some(origin) => vec![origin],
        None => {
            warn!(
                "Dashboard redirect URI {} has no usable origin, CORS is closed",
                state.config.redirect_uri
            );
            Vec::new()
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/", get(routes::home))
        .route("/ping", get(routes::ping))
        .route("/app", get(routes::app))
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", get(auth::logout))
        .route("/me", get(auth::me))
        .route("/guilds", get(auth::guilds))
        .route("/api/{guild_id}/voice-channels", get(routes::voice_channels))
        .route("/api/{guild_id}/state", get(routes::player_state))
        .route("/api/{guild_id}/play", post(routes::play))
        .route("/api/{guild_id}/pause", post(routes::pause))
        .route("/api/{guild_id}/resume", post(routes::resume))
        .route("/api/{guild_id}/skip", post(routes::skip))
        .route("/api/{guild_id}/stop", post(routes::stop))
        .route("/api/{guild_id}/volume", post(routes::volume))
        .layer(sessions)
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves the panel until the listener fails.
pub async fn serve(state: AppState) -> Result<(), Error> {
    let (host, port) = (state.config.host.clone(), state.config.port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("Dashboard listening on http://{}:{}", host, port);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn origin_comes_from_redirect_uri() {
        assert_eq!(
            panel_origin("http://localhost:5000/callback"),
            Some(HeaderValue::from_static("http://localhost:5000"))
        );
        assert_eq!(
            panel_origin("https://music.example.com/callback"),
            Some(HeaderValue::from_static("https://music.example.com"))
        );
        assert_eq!(panel_origin("not a url"), None);
    }
}
