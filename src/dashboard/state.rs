//! Shared state for dashboard handlers.

use ::serenity::all::Cache;
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl, TokenUrl};
use std::sync::Arc;

use super::error::AppError;
use crate::Data;
use crate::config::DashboardConfig;

pub const DISCORD_API: &str = "https://discord.com/api/v10";
const AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";
const TOKEN_URL: &str = "https://discord.com/api/oauth2/token";

/// Discord OAuth2 client with the authorize and token endpoints set.
pub type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Clone)]
pub struct AppState {
    pub config: DashboardConfig,
    pub data: Data,
    pub cache: Arc<Cache>,
    pub oauth_client: OAuthClient,
    /// Client for OAuth and user API calls. Redirects are disabled.
    pub http_client: reqwest::Client,
    pub api_base: String,
}

impl AppState {
    pub fn new(config: DashboardConfig, data: Data, cache: Arc<Cache>) -> Result<Self, AppError> {
        let oauth_client = oauth_client(&config)?;
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            config,
            data,
            cache,
            oauth_client,
            http_client,
            api_base: DISCORD_API.to_string(),
        })
    }
}

pub fn oauth_client(config: &DashboardConfig) -> Result<OAuthClient, AppError> {
    let setup = |e: url::ParseError| AppError::Setup(e.to_string());

    Ok(BasicClient::new(ClientId::new(config.client_id.clone()))
        .set_client_secret(ClientSecret::new(config.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(AUTHORIZE_URL.to_string()).map_err(setup)?)
        .set_token_uri(TokenUrl::new(TOKEN_URL.to_string()).map_err(setup)?)
        .set_redirect_uri(RedirectUrl::new(config.redirect_uri.clone()).map_err(setup)?))
}
