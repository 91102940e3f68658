//! Lavalink v4 REST calls made directly over HTTP: track loading and health probes.

use reqwest::{Client, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::music_manager::{MusicError, MusicResult};
use super::queue_manager::Track;
use crate::config::NodeConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(4);
const LOAD_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    pub length: u64,
    pub is_stream: bool,
    #[serde(default)]
    pub position: u64,
    pub title: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub source_name: String,
}

/// A track as Lavalink encodes it on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTrack {
    pub encoded: String,
    pub info: WireTrackInfo,
    #[serde(default)]
    pub plugin_info: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<Value>,
}

impl From<WireTrack> for Track {
    fn from(wire: WireTrack) -> Self {
        let info = wire.info;
        Track {
            encoded: wire.encoded,
            identifier: info.identifier,
            title: info.title,
            author: info.author,
            length_ms: info.length,
            uri: info.uri,
            artwork_url: info.artwork_url,
            isrc: info.isrc,
            is_stream: info.is_stream,
            is_seekable: info.is_seekable,
            source_name: info.source_name,
            requester: None,
        }
    }
}

impl From<&Track> for WireTrack {
    fn from(track: &Track) -> Self {
        WireTrack {
            encoded: track.encoded.clone(),
            info: WireTrackInfo {
                identifier: track.identifier.clone(),
                is_seekable: track.is_seekable,
                author: track.author.clone(),
                length: track.length_ms,
                is_stream: track.is_stream,
                position: 0,
                title: track.title.clone(),
                uri: track.uri.clone(),
                artwork_url: track.artwork_url.clone(),
                isrc: track.isrc.clone(),
                source_name: track.source_name.clone(),
            },
            plugin_info: Value::Object(Default::default()),
            user_data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    Track(Track),
    Playlist { name: String, tracks: Vec<Track> },
    Search(Vec<Track>),
    Empty,
    Error(String),
}

impl LoadResult {
    pub fn is_empty(&self) -> bool {
        match self {
            LoadResult::Empty => true,
            LoadResult::Search(tracks) => tracks.is_empty(),
            LoadResult::Playlist { tracks, .. } => tracks.is_empty(),
            _ => false,
        }
    }

    /// All tracks of the result, in order.
    pub fn into_tracks(self) -> Vec<Track> {
        match self {
            LoadResult::Track(track) => vec![track],
            LoadResult::Playlist { tracks, .. } | LoadResult::Search(tracks) => tracks,
            LoadResult::Empty | LoadResult::Error(_) => Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadResponse {
    load_type: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct PlaylistData {
    info: PlaylistInfo,
    tracks: Vec<WireTrack>,
}

#[derive(Deserialize)]
struct PlaylistInfo {
    name: String,
}

/// Parses a `/v4/loadtracks` response body.
pub fn parse_load_result(body: &str) -> MusicResult<LoadResult> {
    let response: LoadResponse = serde_json::from_str(body).map_err(|e| MusicError::Backend {
        status: None,
        message: format!("invalid loadtracks payload: {}", e),
    })?;

    let invalid = |e: serde_json::Error| MusicError::Backend {
        status: None,
        message: format!("invalid {} data: {}", response.load_type, e),
    };

    Ok(match response.load_type.as_str() {
        "track" => LoadResult::Track(
            serde_json::from_value::<WireTrack>(response.data.clone())
                .map_err(invalid)?
                .into(),
        ),
        "playlist" => {
            let playlist: PlaylistData =
                serde_json::from_value(response.data.clone()).map_err(invalid)?;
            LoadResult::Playlist {
                name: playlist.info.name,
                tracks: playlist.tracks.into_iter().map(Track::from).collect(),
            }
        }
        "search" => {
            let tracks: Vec<WireTrack> =
                serde_json::from_value(response.data.clone()).map_err(invalid)?;
            LoadResult::Search(tracks.into_iter().map(Track::from).collect())
        }
        "error" => LoadResult::Error(
            response.data["message"]
                .as_str()
                .unwrap_or("unknown load error")
                .to_string(),
        ),
        _ => LoadResult::Empty,
    })
}

/// HTTP client bound to one Lavalink node.
#[derive(Debug, Clone)]
pub struct LavalinkRest {
    client: Client,
    base_url: String,
    password: String,
}

impl LavalinkRest {
    pub fn new(client: Client, node: &NodeConfig) -> Self {
        Self::with_base_url(client, node.base_url(), node.password.clone())
    }

    pub fn with_base_url(client: Client, base_url: String, password: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            password,
        }
    }

    pub async fn load_tracks(&self, identifier: &str) -> MusicResult<LoadResult> {
        let url = format!("{}/v4/loadtracks", self.base_url);
        debug!("Loading tracks from {} for '{}'", url, identifier);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, &self.password)
            .query(&[("identifier", identifier)])
            .timeout(LOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| MusicError::Backend {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| MusicError::Backend {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(MusicError::Backend {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        parse_load_result(&body)
    }

    /// Checks the node over HTTP. Returns the round trip time when it answers below 500.
    pub async fn probe(&self) -> MusicResult<Duration> {
        let started = Instant::now();
        let mut last_error = None;

        for path in ["/v4/info", "/version"] {
            let result = self
                .client
                .get(format!("{}{}", self.base_url, path))
                .header(AUTHORIZATION, &self.password)
                .timeout(PROBE_TIMEOUT)
                .send()
                .await;

            match result {
                Ok(response) if response.status().as_u16() < 500 => {
                    return Ok(started.elapsed());
                }
                Ok(response) => {
                    last_error = Some(MusicError::Backend {
                        status: Some(response.status().as_u16()),
                        message: format!("{} answered {}", path, response.status()),
                    });
                }
                Err(e) => {
                    warn!("Probe of {}{} failed: {}", self.base_url, path, e);
                    last_error = Some(MusicError::Backend {
                        status: None,
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(last_error.unwrap_or(MusicError::NoNodesAvailable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn wire_track(id: &str) -> Value {
        json!({
            "encoded": format!("QAAA{}", id),
            "info": {
                "identifier": id,
                "isSeekable": true,
                "author": "Band",
                "length": 215000,
                "isStream": false,
                "position": 0,
                "title": format!("Song {}", id),
                "uri": format!("https://youtu.be/{}", id),
                "artworkUrl": null,
                "isrc": null,
                "sourceName": "youtube"
            },
            "pluginInfo": {},
            "userData": {}
        })
    }

    #[test]
    fn parses_every_load_type() {
        let track = json!({"loadType": "track", "data": wire_track("a")}).to_string();
        assert_matches!(parse_load_result(&track), Ok(LoadResult::Track(t)) if t.identifier == "a");

        let playlist = json!({
            "loadType": "playlist",
            "data": {"info": {"name": "Mix", "selectedTrack": -1}, "pluginInfo": {}, "tracks": [wire_track("a"), wire_track("b")]}
        })
        .to_string();
        assert_matches!(
            parse_load_result(&playlist),
            Ok(LoadResult::Playlist { name, tracks }) if name == "Mix" && tracks.len() == 2
        );

        let search = json!({"loadType": "search", "data": [wire_track("c")]}).to_string();
        assert_matches!(parse_load_result(&search), Ok(LoadResult::Search(t)) if t.len() == 1);

        let empty = json!({"loadType": "empty", "data": {}}).to_string();
        assert_eq!(parse_load_result(&empty).unwrap(), LoadResult::Empty);

        let error = json!({"loadType": "error", "data": {"message": "blocked", "severity": "common"}})
            .to_string();
        assert_eq!(
            parse_load_result(&error).unwrap(),
            LoadResult::Error("blocked".to_string())
        );
    }

    #[test]
    fn track_conversion_keeps_metadata() {
        let wire: WireTrack = serde_json::from_value(wire_track("z")).unwrap();
        let track = Track::from(wire);
        assert_eq!(track.length_ms, 215000);
        assert_eq!(track.uri.as_deref(), Some("https://youtu.be/z"));

        let back = WireTrack::from(&track);
        assert_eq!(back.info.title, "Song z");
        assert_eq!(back.encoded, "QAAAz");
    }

    #[tokio::test]
    async fn load_tracks_sends_password_and_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/loadtracks"))
            .and(query_param("identifier", "ytsearch:song"))
            .and(header("Authorization", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"loadType": "search", "data": [wire_track("q")]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let rest = LavalinkRest::with_base_url(Client::new(), server.uri(), "secret".into());
        let result = rest.load_tracks("ytsearch:song").await.unwrap();
        assert_eq!(result.into_tracks()[0].identifier, "q");
    }

    #[tokio::test]
    async fn load_tracks_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/loadtracks"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let rest = LavalinkRest::with_base_url(Client::new(), server.uri(), "bad".into());
        assert_matches!(
            rest.load_tracks("x").await,
            Err(MusicError::Backend { status: Some(401), .. })
        );
    }

    #[tokio::test]
    async fn probe_falls_back_to_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/info"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(ResponseTemplate::new(200).set_body_string("4.0.8"))
            .expect(1)
            .mount(&server)
            .await;

        let rest = LavalinkRest::with_base_url(Client::new(), server.uri(), "pw".into());
        assert!(rest.probe().await.is_ok());
    }

    #[tokio::test]
    async fn probe_fails_when_both_endpoints_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let rest = LavalinkRest::with_base_url(Client::new(), server.uri(), "pw".into());
        assert_matches!(
            rest.probe().await,
            Err(MusicError::Backend { status: Some(500), .. })
        );
    }
}
