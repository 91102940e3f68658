//! Discord OAuth2 login and the session helpers built on it.

use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use oauth2::{AuthorizationCode, CsrfToken, Scope, TokenResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use tower_sessions::Session;
use tracing::{debug, info};

use super::error::AppError;
use super::state::AppState;

const SESSION_USER: &str = "dashboard:user";
const SESSION_CSRF: &str = "dashboard:csrf_state";

/// The logged-in user as kept in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

/// A guild from `/users/@me/guilds`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserGuild {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub state: String,
    pub code: String,
}

pub async fn session_user(session: &Session) -> Result<Option<SessionUser>, AppError> {
    Ok(session.get::<SessionUser>(SESSION_USER).await?)
}

pub async fn require_user(session: &Session) -> Result<SessionUser, AppError> {
    session_user(session).await?.ok_or(AppError::Unauthorized)
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let (url, csrf_state) = state
        .oauth_client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("identify".to_string()))
        .add_scope(Scope::new("guilds".to_string()))
        .url();

    session.insert(SESSION_CSRF, csrf_state.secret()).await?;
    Ok(Redirect::to(url.as_str()))
}

pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, AppError> {
    let stored: Option<String> = session.remove(SESSION_CSRF).await?;
    if stored.as_deref() != Some(params.state.as_str()) {
        debug!("Dashboard login rejected: OAuth state mismatch");
        return Err(AppError::CsrfMismatch);
    }

    let token = state
        .oauth_client
        .exchange_code(AuthorizationCode::new(params.code))
        .request_async(&state.http_client)
        .await
        .map_err(|e| AppError::OAuth(e.to_string()))?;
    let access_token = token.access_token().secret().clone();

    let user = fetch_user(&state.http_client, &state.api_base, &access_token).await?;
    info!("Dashboard login by {} ({})", user.username, user.id);

    session.cycle_id().await?;
    session
        .insert(
            SESSION_USER,
            SessionUser {
                id: user.id,
                username: user.global_name.unwrap_or(user.username),
                access_token,
            },
        )
        .await?;
    Ok(Redirect::to("/app"))
}

pub async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    session.flush().await?;
    Ok(Redirect::to("/"))
}

pub async fn me(session: Session) -> Result<Json<Value>, AppError> {
    let user = require_user(&session).await?;
    Ok(Json(json!({ "id": user.id, "username": user.username })))
}

pub async fn guilds(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, AppError> {
    let user = require_user(&session).await?;
    let user_guilds = fetch_guilds(&state.http_client, &state.api_base, &user.access_token).await?;
    let bot_guilds: HashSet<u64> = state.cache.guilds().into_iter().map(|g| g.get()).collect();

    Ok(Json(json!({
        "user_id": user.id,
        "mutual_guilds": mutual_guilds(user_guilds, &bot_guilds),
    })))
}

pub async fn fetch_user(
    client: &reqwest::Client,
    api_base: &str,
    access_token: &str,
) -> Result<DiscordUser, AppError> {
    let user = client
        .get(format!("{}/users/@me", api_base))
        .bearer_auth(access_token)
        .send()
        .await?
        .error_for_status()?
        .json::<DiscordUser>()
        .await?;
    Ok(user)
}

pub async fn fetch_guilds(
    client: &reqwest::Client,
    api_base: &str,
    access_token: &str,
) -> Result<Vec<UserGuild>, AppError> {
    let response = client
        .get(format!("{}/users/@me/guilds", api_base))
        .bearer_auth(access_token)
        .send()
        .await?;
    if response.status().as_u16() == 401 {
        return Err(AppError::Unauthorized);
    }
    Ok(response.error_for_status()?.json::<Vec<UserGuild>>().await?)
}

/// Guilds the user shares with the bot, as `{id, name}` objects.
pub fn mutual_guilds(user_guilds: Vec<UserGuild>, bot_guilds: &HashSet<u64>) -> Vec<Value> {
    user_guilds
        .into_iter()
        .filter(|g| {
            g.id.parse::<u64>()
                .map(|id| bot_guilds.contains(&id))
                .unwrap_or(false)
        })
        .map(|g| json!({ "id": g.id, "name": g.name }))
        .collect()
}
