//! melody: a Discord music bot that streams through Lavalink nodes.

use poise::serenity_prelude as serenity;
use ::serenity::all::{ClientBuilder, GuildId};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod config;
#[cfg(feature = "dashboard")]
pub mod dashboard;
pub mod events;
pub mod utils;

use commands::music::utils::{
    embedded_messages::{error_reply, music_error_reply},
    event_handlers::{PlayerEvents, PlayerUi},
    lavalink_backend,
    lonely_channel::LonelyTracker,
    lyrics::{LyricsClient, LyricsSessions},
    music_manager::{MusicError, MusicManager},
    node_pool::NodePool,
    voice_gateway::SongbirdGateway,
    voice_status::VoiceStatus,
};
use config::Config;
use utils::bot_logger::BotLogger;
use utils::database::Database;
use utils::localization::{Localizer, Translator, guild_translator};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// Shared state handed to every command and event.
#[derive(Clone)]
pub struct Data {
    pub config: Arc<Config>,
    pub database: Database,
    pub locales: Arc<Localizer>,
    pub music: Arc<MusicManager>,
    pub ui: Arc<PlayerUi>,
    pub lyrics: LyricsClient,
    pub lyrics_sessions: Arc<LyricsSessions>,
    pub lonely: Arc<LonelyTracker>,
    pub voice_status: VoiceStatus,
    pub logger: BotLogger,
    pub http_client: reqwest::Client,
}

impl Data {
    /// Translator for the guild's stored language, or the default one outside guilds.
    pub fn translator(&self, guild_id: Option<GuildId>) -> Translator {
        guild_translator(&self.locales, &self.database, guild_id)
    }
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let tr = ctx.data().translator(ctx.guild_id());
            if let Some(music_error) = error.downcast_ref::<MusicError>() {
                debug!("/{} failed: {}", ctx.command().qualified_name, music_error);
                if let Err(e) = ctx.send(music_error_reply(&tr, music_error)).await {
                    warn!("Failed to report command error: {}", e);
                }
                return;
            }

            error!("Error in command `{}`: {}", ctx.command().qualified_name, error);
            if let Err(e) = ctx.send(error_reply(&tr, tr.t("errors.unexpected"))).await {
                warn!("Failed to report command error: {}", e);
            }
            ctx.data()
                .logger
                .log_error(
                    &format!("/{}", ctx.command().qualified_name),
                    &error.to_string(),
                )
                .await;
        }
        poise::FrameworkError::CommandCheckFailed { ctx, error, .. } => {
            if let Some(error) = error {
                error!("Check for `{}` errored: {}", ctx.command().qualified_name, error);
            }
            let tr = ctx.data().translator(ctx.guild_id());
            if let Err(e) = ctx.send(error_reply(&tr, tr.t("errors.no_permission"))).await {
                warn!("Failed to report failed check: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

async fn build_data(
    ctx: &serenity::Context,
    ready: &serenity::Ready,
    config: Arc<Config>,
    database: Database,
    locales: Arc<Localizer>,
) -> Result<Data, Error> {
    let songbird = songbird::get(ctx)
        .await
        .ok_or("Songbird voice client was not registered")?;
    let http_client = reqwest::Client::new();

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let (backend, nodes) =
        lavalink_backend::connect(&config.nodes, ready.user.id, http_client.clone(), events_tx)
            .await;

    let pool = Arc::new(NodePool::new(nodes));
    pool.log_status_panel();
    Arc::clone(&pool).spawn_watchdog();

    let music = Arc::new(MusicManager::new(
        backend,
        Arc::new(SongbirdGateway::new(songbird)),
        pool,
        Some(database.clone()),
    ));
    let ui = Arc::new(PlayerUi::new(ctx.http.clone(), music.clone()));
    let voice_status = VoiceStatus::new(http_client.clone(), config.discord_token.clone());
    let logger = BotLogger::new(ctx.http.clone(), database.clone(), config.log_channel_id);

    PlayerEvents {
        music: music.clone(),
        ui: ui.clone(),
        voice_status: voice_status.clone(),
        logger: logger.clone(),
        locales: locales.clone(),
        database: database.clone(),
        cache: ctx.cache.clone(),
    }
    .spawn(events_rx);

    Ok(Data {
        lonely: Arc::new(LonelyTracker::new(config.lonely_timeout)),
        config,
        database,
        locales,
        music,
        ui,
        lyrics: LyricsClient::new(http_client.clone()),
        lyrics_sessions: Arc::new(LyricsSessions::new()),
        voice_status,
        logger,
        http_client,
    })
}

/// Connects to Discord and runs until the gateway client stops.
pub async fn run(config: Config) -> Result<(), Error> {
    let config = Arc::new(config);
    let database = Database::open(&config.database_path)?;
    let locales = Arc::new(Localizer::load(
        &config.locales_dir,
        config.default_locale.clone(),
    ));
    info!(
        "Loaded locales from {}, default {}",
        config.locales_dir,
        locales.default_locale()
    );

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let setup_config = config.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                let data = build_data(ctx, ready, setup_config, database, locales).await?;

                #[cfg(feature = "dashboard")]
                {
                    if let Some(dashboard) = data.config.dashboard.clone() {
                        match dashboard::AppState::new(dashboard, data.clone(), ctx.cache.clone()) {
                            Ok(state) => {
                                tokio::spawn(async move {
                                    if let Err(e) = dashboard::serve(state).await {
                                        error!("Dashboard stopped: {}", e);
                                    }
                                });
                            }
                            Err(e) => error!("Dashboard disabled: {}", e),
                        }
                    }
                }

                Ok(data)
            })
        })
        .build();

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .register_songbird()
        .await?;
    client.start().await.map_err(Into::into)
}
