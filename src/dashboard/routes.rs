//! Panel page and the per-guild player API.

use ::serenity::all::{ChannelId, ChannelType, GuildChannel, GuildId};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tower_sessions::Session;
use tracing::info;

use super::auth::{require_user, session_user};
use super::error::AppError;
use super::state::AppState;
use crate::commands::music::utils::{
    autocomplete::SearchService, backend::PlayerSnapshot, lavalink_rest::LoadResult,
    music_manager::MAX_VOLUME, queue_manager::GuildQueue, queue_manager::Track,
};

const PANEL: &str = include_str!("panel.html");

#[derive(Debug, Default, Deserialize)]
pub struct PlayRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub voice_channel_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VolumeRequest {
    #[serde(default)]
    pub level: Option<Value>,
}

/// Snowflakes arrive as strings or numbers. Zero is never a valid id.
pub fn parse_snowflake(value: &Value) -> Option<u64> {
    let id = match value {
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        Value::Number(n) => n.as_u64()?,
        _ => return None,
    };
    (id != 0).then_some(id)
}

pub fn parse_level(level: Option<&Value>) -> Result<u16, AppError> {
    let level = match level {
        None | Some(Value::Null) => return Err(AppError::MissingLevel),
        Some(Value::Number(n)) => n.as_i64().ok_or(AppError::InvalidLevel)?,
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| AppError::InvalidLevel)?,
        Some(_) => return Err(AppError::InvalidLevel),
    };
    if !(0..=i64::from(MAX_VOLUME)).contains(&level) {
        return Err(AppError::LevelOutOfRange);
    }
    Ok(level as u16)
}

fn guild_id(raw: u64) -> Result<GuildId, AppError> {
    if raw == 0 {
        return Err(AppError::GuildNotFound);
    }
    Ok(GuildId::new(raw))
}

fn is_voice(kind: ChannelType) -> bool {
    matches!(kind, ChannelType::Voice | ChannelType::Stage)
}

pub fn track_json(track: &Track) -> Value {
    json!({
        "title": track.title,
        "author": track.author,
        "length": track.length_ms,
        "artwork": track.artwork_url,
        "uri": track.uri,
    })
}

/// Body of `GET /api/{guild}/state`.
pub fn state_json(
    queue: Option<&GuildQueue>,
    player: Option<&PlayerSnapshot>,
    channel_id: Option<ChannelId>,
) -> Value {
    let Some(queue) = queue else {
        return json!({ "ok": true, "connected": false, "queue": [] });
    };

    let position = player.map(|p| p.position).unwrap_or(Duration::ZERO);
    json!({
        "ok": true,
        "connected": true,
        "playing": queue.current.is_some() && !queue.paused,
        "paused": queue.paused,
        "volume": queue.volume,
        "position": position.as_millis() as u64,
        "channel_id": channel_id.map(|c| c.get().to_string()),
        "current": queue.current.as_ref().map(track_json),
        "queue": queue.upcoming.iter().map(track_json).collect::<Vec<_>>(),
    })
}

pub fn voice_channel_entries<'a>(channels: impl Iterator<Item = &'a GuildChannel>) -> Vec<Value> {
    let mut voice: Vec<&GuildChannel> = channels.filter(|c| is_voice(c.kind)).collect();
    voice.sort_by_key(|c| (c.position, c.id));
    voice
        .into_iter()
        .map(|c| {
            json!({
                "id": c.id.get().to_string(),
                "name": c.name,
                "type": if c.kind == ChannelType::Stage { "stage" } else { "voice" },
                "bitrate": c.bitrate,
                "user_limit": c.user_limit,
            })
        })
        .collect()
}

pub async fn home() -> Redirect {
    Redirect::to("/app")
}

pub async fn ping() -> &'static str {
    "pong"
}

pub async fn app(session: Session) -> Result<Response, AppError> {
    if session_user(&session).await?.is_none() {
        return Ok(Redirect::to("/login").into_response());
    }
    Ok(Html(PANEL).into_response())
}

pub async fn voice_channels(
    State(state): State<AppState>,
    session: Session,
    Path(raw_guild): Path<u64>,
) -> Result<Json<Value>, AppError> {
    require_user(&session).await?;
    let guild_id = guild_id(raw_guild)?;

    let channels = {
        let guild = state.cache.guild(guild_id).ok_or(AppError::GuildNotFound)?;
        voice_channel_entries(guild.channels.values())
    };
    Ok(Json(json!({ "ok": true, "channels": channels })))
}

pub async fn player_state(
    State(state): State<AppState>,
    session: Session,
    Path(raw_guild): Path<u64>,
) -> Result<Json<Value>, AppError> {
    require_user(&session).await?;
    let guild_id = guild_id(raw_guild)?;
    if state.cache.guild(guild_id).is_none() {
        return Err(AppError::GuildNotFound);
    }

    let music = &state.data.music;
    let queue = music.queue(guild_id).await;
    let player = match queue {
        Some(_) => music.player_state(guild_id).await,
        None => None,
    };
    let channel = match queue {
        Some(_) => music.voice_channel(guild_id).await,
        None => None,
    };
    Ok(Json(state_json(queue.as_ref(), player.as_ref(), channel)))
}

pub async fn play(
    State(state): State<AppState>,
    session: Session,
    Path(raw_guild): Path<u64>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let user = require_user(&session).await?;
    let request: PlayRequest = serde_json::from_slice(&body).unwrap_or_default();

    let query = request
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or(AppError::MissingQuery)?;
    let raw_channel = request
        .voice_channel_id
        .filter(|v| !v.is_null() && v.as_str() != Some(""))
        .ok_or(AppError::VoiceChannelRequired)?;

    let guild_id = guild_id(raw_guild)?;
    let voice_channel = {
        let guild = state.cache.guild(guild_id).ok_or(AppError::GuildNotFound)?;
        parse_snowflake(&raw_channel)
            .map(ChannelId::new)
            .filter(|id| guild.channels.get(id).is_some_and(|c| is_voice(c.kind)))
            .ok_or(AppError::InvalidVoiceChannel)?
    };

    let music = &state.data.music;
    let result = music
        .nodes()
        .search(&SearchService::Youtube.query(&query))
        .await?;
    if result.is_empty() {
        return Err(AppError::NoResults);
    }
    info!("Dashboard play by {} in guild {}: {}", user.username, guild_id, query);

    music.ensure_active_player(guild_id, voice_channel, None).await?;
    match result {
        LoadResult::Playlist { name, tracks } => {
            let added = tracks.len();
            music.play_or_enqueue(guild_id, tracks, None).await?;
            Ok(Json(json!({
                "ok": true,
                "type": "playlist",
                "name": name,
                "added": added,
            })))
        }
        other => {
            let track = other
                .into_tracks()
                .into_iter()
                .next()
                .ok_or(AppError::NoResults)?;
            let title = track.title.clone();
            let enqueued = music.play_or_enqueue(guild_id, vec![track], None).await?;
            Ok(Json(json!({
                "ok": true,
                "type": "track",
                "title": title,
                "queued": enqueued.started.is_none(),
            })))
        }
    }
}

async fn set_paused(state: &AppState, raw_guild: u64, paused: bool) -> Result<Json<Value>, AppError> {
    let guild_id = guild_id(raw_guild)?;
    let data = &state.data;
    if data.music.current_track(guild_id).await.is_none() {
        return Err(AppError::NoPlayer);
    }

    data.music.set_paused(guild_id, paused).await?;
    data.ui.refresh(guild_id, &data.translator(Some(guild_id))).await;
    Ok(Json(json!({ "ok": true })))
}

pub async fn pause(
    State(state): State<AppState>,
    session: Session,
    Path(raw_guild): Path<u64>,
) -> Result<Json<Value>, AppError> {
    require_user(&session).await?;
    set_paused(&state, raw_guild, true).await
}

pub async fn resume(
    State(state): State<AppState>,
    session: Session,
    Path(raw_guild): Path<u64>,
) -> Result<Json<Value>, AppError> {
    require_user(&session).await?;
    set_paused(&state, raw_guild, false).await
}

pub async fn skip(
    State(state): State<AppState>,
    session: Session,
    Path(raw_guild): Path<u64>,
) -> Result<Json<Value>, AppError> {
    require_user(&session).await?;
    let guild_id = guild_id(raw_guild)?;
    state.data.music.skip(guild_id).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn stop(
    State(state): State<AppState>,
    session: Session,
    Path(raw_guild): Path<u64>,
) -> Result<Json<Value>, AppError> {
    let user = require_user(&session).await?;
    let guild_id = guild_id(raw_guild)?;
    let data = &state.data;

    let voice_channel = data.music.voice_channel(guild_id).await;
    data.music.stop(guild_id).await?;
    data.ui.clear_message(guild_id).await;
    data.lonely.cancel(guild_id);
    if let Some(channel) = voice_channel {
        data.voice_status.clear(channel).await;
    }
    info!("Dashboard stop by {} in guild {}", user.username, guild_id);
    Ok(Json(json!({ "ok": true })))
}

pub async fn volume(
    State(state): State<AppState>,
    session: Session,
    Path(raw_guild): Path<u64>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    require_user(&session).await?;
    let request: VolumeRequest = serde_json::from_slice(&body).unwrap_or_default();
    let level = parse_level(request.level.as_ref())?;
    let guild_id = guild_id(raw_guild)?;

    let data = &state.data;
    let level = data.music.set_volume(guild_id, level).await?;
    data.ui.refresh(guild_id, &data.translator(Some(guild_id))).await;
    Ok(Json(json!({ "ok": true, "level": level })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(json!("123"), Some(123))]
    #[case(json!(456), Some(456))]
    #[case(json!(" 789 "), Some(789))]
    #[case(json!("0"), None)]
    #[case(json!("voice"), None)]
    #[case(json!(-3), None)]
    #[case(json!(true), None)]
    fn snowflakes(#[case] value: Value, #[case] expected: Option<u64>) {
        assert_eq!(parse_snowflake(&value), expected);
    }

    #[test]
    fn volume_levels_are_validated() {
        assert_matches!(parse_level(None), Err(AppError::MissingLevel));
        assert_matches!(parse_level(Some(&Value::Null)), Err(AppError::MissingLevel));
        assert_matches!(parse_level(Some(&json!("loud"))), Err(AppError::InvalidLevel));
        assert_matches!(parse_level(Some(&json!(12.5))), Err(AppError::InvalidLevel));
        assert_matches!(parse_level(Some(&json!(151))), Err(AppError::LevelOutOfRange));
        assert_matches!(parse_level(Some(&json!(-1))), Err(AppError::LevelOutOfRange));
        assert_matches!(parse_level(Some(&json!("80"))), Ok(80));
        assert_matches!(parse_level(Some(&json!(150))), Ok(150));
    }

    #[test]
    fn idle_guild_state() {
        assert_eq!(
            state_json(None, None, None),
            json!({ "ok": true, "connected": false, "queue": [] })
        );
    }

    #[test]
    fn active_guild_state() {
        let mut queue = GuildQueue::default();
        queue.current = Some(Track {
            title: "Now".into(),
            author: "Artist".into(),
            length_ms: 1000,
            ..Default::default()
        });
        queue.enqueue(Track {
            title: "Next".into(),
            ..Default::default()
        });
        queue.paused = true;
        let player = PlayerSnapshot {
            track: None,
            position: Duration::from_millis(2500),
            paused: true,
            volume: 100,
            connected: true,
        };

        let state = state_json(Some(&queue), Some(&player), Some(ChannelId::new(9)));
        assert_eq!(state["connected"], json!(true));
        assert_eq!(state["playing"], json!(false));
        assert_eq!(state["position"], json!(2500));
        assert_eq!(state["channel_id"], json!("9"));
        assert_eq!(state["current"]["title"], json!("Now"));
        assert_eq!(state["queue"][0]["title"], json!("Next"));
    }

    #[test]
    fn play_body_tolerates_junk() {
        let request: PlayRequest = serde_json::from_slice(b"not json").unwrap_or_default();
        assert!(request.query.is_none());
        let request: PlayRequest =
            serde_json::from_slice(br#"{"query":"song","voice_channel_id":"12"}"#).unwrap();
        assert_eq!(request.query.as_deref(), Some("song"));
        assert_eq!(request.voice_channel_id, Some(json!("12")));
    }
}
