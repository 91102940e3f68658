//! Lyrics from LRCLIB, and the loop that keeps a message in step with playback.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serenity::all::{
    ChannelId, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, EditMessage, GuildId, Http,
    MessageId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::music_manager::MusicManager;
use super::queue_manager::Track;
use super::truncate;
use crate::utils::localization::Translator;

pub const LRCLIB_API: &str = "https://lrclib.net/api";
const USER_AGENT: &str = concat!("melody/", env!("CARGO_PKG_VERSION"), " (+https://lrclib.net)");
const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

pub const LYRICS_COLOR: u32 = 0xffff64;
const DESCRIPTION_LIMIT: usize = 4000;
const LOOKAHEAD: Duration = Duration::from_millis(250);
const WINDOW: usize = 2;
const SYNC_INTERVAL: Duration = Duration::from_secs(1);
const MAX_EDIT_FAILURES: u32 = 3;

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d{1,3}):(\d{1,2})(?:[.:](\d{1,3}))?\]").expect("valid timestamp regex")
});
static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:\([^)]*\)|\[[^\]]*\]|\{[^}]*\})").expect("valid bracket regex")
});
static FEATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:feat\.|featuring|ft\.)\s+").expect("valid feature regex")
});
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

#[derive(Error, Debug)]
pub enum LyricsError {
    #[error("LRCLIB request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LRCLIB answered {0}")]
    Status(u16),
}

/// One entry of LRCLIB's `get`/`search` responses.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LrclibRecord {
    pub id: u64,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: Option<String>,
    pub duration: Option<f64>,
    pub instrumental: bool,
    pub plain_lyrics: Option<String>,
    pub synced_lyrics: Option<String>,
}

impl LrclibRecord {
    fn has_lyrics(&self) -> bool {
        self.plain_lyrics.as_deref().is_some_and(|l| !l.trim().is_empty())
            || self.synced_lyrics.as_deref().is_some_and(|l| !l.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    pub track_name: String,
    pub artist_name: String,
    pub duration: Option<u64>,
}

impl SearchQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("track_name", self.track_name.clone()),
            ("artist_name", self.artist_name.clone()),
        ];
        if let Some(duration) = self.duration {
            params.push(("duration", duration.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    pub at: Duration,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lyrics {
    pub title: String,
    pub artist: String,
    /// Full plain text, shown once syncing ends.
    pub text: String,
    /// Timed lines, empty when only plain lyrics exist.
    pub lines: Vec<LyricLine>,
}

impl Lyrics {
    pub fn is_synced(&self) -> bool {
        !self.lines.is_empty()
    }
}

/// Drops bracketed parts and normalises dashes.
pub fn sanitize(value: &str) -> String {
    BRACKETED.replace_all(value, "").replace('–', "-").trim().to_string()
}

pub fn strip_feature_credit(artist: &str) -> String {
    FEATURE
        .split(artist)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn duration_secs(track: &Track) -> Option<u64> {
    (track.length_ms > 0).then(|| (track.length_ms + 500) / 1000)
}

/// Search variants from most to least specific, without repeats.
pub fn query_variants(track: &Track) -> Vec<SearchQuery> {
    let duration = duration_secs(track);
    let mut queries: Vec<SearchQuery> = Vec::new();
    let mut add = |track_name: &str, artist_name: &str| {
        let query = SearchQuery {
            track_name: track_name.to_string(),
            artist_name: artist_name.to_string(),
            duration,
        };
        if !query.track_name.is_empty() && !queries.contains(&query) {
            queries.push(query);
        }
    };

    add(track.title.trim(), track.author.trim());

    let title = sanitize(&track.title);
    let artist = sanitize(&track.author);
    add(&title, &artist);

    let main_artist = strip_feature_credit(&artist);
    if main_artist != artist {
        add(&title, &main_artist);
    }

    if let Some((main_title, _)) = title.split_once(" - ") {
        add(main_title.trim(), &main_artist);
    }

    add(&title, "");
    queries
}

/// Exact title with a matching artist wins, then the closest duration.
pub fn select_best(records: Vec<LrclibRecord>, track: &Track) -> Option<LrclibRecord> {
    let mut valid: Vec<LrclibRecord> = records.into_iter().filter(|r| r.has_lyrics()).collect();
    if valid.is_empty() {
        return None;
    }

    let title = track.title.to_lowercase();
    let artist = track.author.to_lowercase();
    if let Some(index) = valid.iter().position(|r| {
        let record_artist = r.artist_name.to_lowercase();
        r.track_name.to_lowercase() == title
            && (artist.is_empty()
                || record_artist.contains(&artist)
                || artist.contains(&record_artist))
    }) {
        return Some(valid.swap_remove(index));
    }

    if let Some(target) = duration_secs(track) {
        let target = target as f64;
        valid.sort_by(|a, b| {
            let da = (a.duration.unwrap_or(target) - target).abs();
            let db = (b.duration.unwrap_or(target) - target).abs();
            da.total_cmp(&db)
        });
    }
    valid.into_iter().next()
}

/// Parses LRC text. A line with several stamps appears once per stamp.
pub fn parse_synced(synced: &str) -> Vec<LyricLine> {
    let mut lines = Vec::new();

    for raw in synced.lines() {
        let text = TIMESTAMP.replace_all(raw, "").trim().to_string();
        if text.is_empty() {
            continue;
        }
        for caps in TIMESTAMP.captures_iter(raw) {
            let minutes: u64 = caps[1].parse().unwrap_or(0);
            let seconds: u64 = caps[2].parse().unwrap_or(0);
            let millis: u64 = caps
                .get(3)
                .map(|m| format!("{:0<3}", m.as_str()).parse().unwrap_or(0))
                .unwrap_or(0);
            lines.push(LyricLine {
                at: Duration::from_millis(minutes * 60_000 + seconds * 1000 + millis),
                text: text.clone(),
            });
        }
    }

    lines.sort_by_key(|line| line.at);
    lines
}

pub fn clean_plain(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = BLANK_RUNS.replace_all(&normalized, "\n\n");
    collapsed
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub fn into_lyrics(record: LrclibRecord, track: &Track) -> Option<Lyrics> {
    let lines = record
        .synced_lyrics
        .as_deref()
        .map(parse_synced)
        .unwrap_or_default();

    let mut text = record
        .plain_lyrics
        .as_deref()
        .map(clean_plain)
        .unwrap_or_default();
    if text.is_empty() {
        text = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
    }
    if text.is_empty() && lines.is_empty() {
        return None;
    }

    Some(Lyrics {
        title: if record.track_name.is_empty() {
            track.title.clone()
        } else {
            record.track_name
        },
        artist: if record.artist_name.is_empty() {
            track.author.clone()
        } else {
            record.artist_name
        },
        text,
        lines,
    })
}

#[derive(Clone)]
pub struct LyricsClient {
    client: Client,
    base_url: String,
}

impl LyricsClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, LRCLIB_API.to_string())
    }

    pub fn with_base_url(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, LyricsError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(params)
            .header("User-Agent", USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(LyricsError::Status(status.as_u16())),
        }
    }

    /// Looks the track up by ISRC, then through the search variants.
    /// `Ok(None)` means LRCLIB answered but had nothing usable.
    pub async fn fetch(&self, track: &Track) -> Result<Option<Lyrics>, LyricsError> {
        if let Some(isrc) = track.isrc.as_deref().map(str::trim).filter(|i| !i.is_empty()) {
            match self
                .request::<LrclibRecord>("get", &[("isrc", isrc.to_string())])
                .await
            {
                Ok(Some(record)) if record.has_lyrics() => {
                    debug!("Found lyrics for '{}' by ISRC", track.title);
                    return Ok(into_lyrics(record, track));
                }
                Ok(_) => {}
                Err(e) => debug!("ISRC lookup for '{}' failed: {}", track.title, e),
            }
        }

        let mut last_error = None;
        let mut answered = false;
        for query in query_variants(track) {
            match self
                .request::<Vec<LrclibRecord>>("search", &query.params())
                .await
            {
                Ok(records) => {
                    answered = true;
                    if let Some(best) = select_best(records.unwrap_or_default(), track) {
                        info!(
                            "Found lyrics for '{}' as '{}' by '{}'",
                            track.title, best.track_name, best.artist_name
                        );
                        return Ok(into_lyrics(best, track));
                    }
                }
                Err(e) => {
                    warn!("LRCLIB search {:?} failed: {}", query.track_name, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }
}

/// Index of the line being sung at `position`.
pub fn line_index(lines: &[LyricLine], position: Duration) -> Option<usize> {
    let first = lines.first()?;
    let ahead = position + LOOKAHEAD;
    if ahead < first.at {
        return Some(0);
    }
    lines.iter().rposition(|line| line.at <= ahead)
}

/// The current line and `WINDOW` lines around it, current one highlighted.
pub fn render_window(lines: &[LyricLine], index: usize) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let index = index.min(lines.len() - 1);
    let start = index.saturating_sub(WINDOW);
    let end = (index + WINDOW + 1).min(lines.len());

    (start..end)
        .map(|i| {
            if i == index {
                format!("**→ {} ←**", lines[i].text)
            } else {
                lines[i].text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn lyrics_embed(tr: &Translator, lyrics: &Lyrics, track: &Track, description: &str) -> CreateEmbed {
    let description = if description.trim().is_empty() {
        tr.t("lyrics.empty")
    } else {
        truncate(description, DESCRIPTION_LIMIT)
    };

    let mut author = CreateEmbedAuthor::new(&lyrics.artist);
    if let Some(artwork) = &track.artwork_url {
        author = author.icon_url(artwork);
    }
    let mut embed = CreateEmbed::new()
        .title(tr.tf("lyrics.title", &[("title", lyrics.title.clone())]))
        .description(description)
        .color(LYRICS_COLOR)
        .author(author)
        .footer(CreateEmbedFooter::new(tr.tf(
            "lyrics.footer",
            &[("track", track.title.clone())],
        )));
    if let Some(uri) = &track.uri {
        embed = embed.url(uri);
    }
    embed
}

/// Channels with a running lyrics session. One per channel.
#[derive(Default)]
pub struct LyricsSessions {
    active: DashMap<ChannelId, Arc<AtomicBool>>,
}

impl LyricsSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the channel. `None` when a session is already running there.
    pub fn try_start(&self, channel_id: ChannelId) -> Option<Arc<AtomicBool>> {
        match self.active.entry(channel_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let flag = Arc::new(AtomicBool::new(false));
                slot.insert(flag.clone());
                Some(flag)
            }
        }
    }

    pub fn is_active(&self, channel_id: ChannelId) -> bool {
        self.active.contains_key(&channel_id)
    }

    /// Stops the channel's session without the final full-lyrics edit.
    pub fn cancel(&self, channel_id: ChannelId) -> bool {
        match self.active.remove(&channel_id) {
            Some((_, flag)) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn finish(&self, channel_id: ChannelId) {
        self.active.remove(&channel_id);
    }
}

fn is_unknown_message(e: &serenity::Error) -> bool {
    matches!(
        e,
        serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
    )
}

/// Everything the sync loop needs. Built by `/lyrics` for a synced result.
pub struct LyricsSync {
    pub http: Arc<Http>,
    pub music: Arc<MusicManager>,
    pub sessions: Arc<LyricsSessions>,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub track: Track,
    pub lyrics: Lyrics,
    pub tr: Translator,
    pub cancelled: Arc<AtomicBool>,
}

impl LyricsSync {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn edit(&self, description: &str) -> Result<(), serenity::Error> {
        let embed = lyrics_embed(&self.tr, &self.lyrics, &self.track, description);
        self.channel_id
            .edit_message(&self.http, self.message_id, EditMessage::new().embed(embed))
            .await
            .map(|_| ())
    }

    async fn still_playing(&self) -> bool {
        match self.music.current_track(self.guild_id).await {
            Some(current) => current.is_same(&self.track),
            None => false,
        }
    }

    async fn run(self) {
        let mut last_index = None;
        let mut failures = 0;
        let mut message_gone = false;

        while !self.cancelled.load(Ordering::SeqCst) && self.still_playing().await {
            let position = self.music.position(self.guild_id).await;
            let index = line_index(&self.lyrics.lines, position);

            if index.is_some() && index != last_index {
                let snippet = render_window(&self.lyrics.lines, index.unwrap_or_default());
                match self.edit(&snippet).await {
                    Ok(()) => failures = 0,
                    Err(e) if is_unknown_message(&e) => {
                        message_gone = true;
                        break;
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(
                            "Lyrics edit failed in channel {} ({}/{}): {}",
                            self.channel_id, failures, MAX_EDIT_FAILURES, e
                        );
                        if failures >= MAX_EDIT_FAILURES {
                            break;
                        }
                    }
                }
                last_index = index;
            }

            tokio::time::sleep(SYNC_INTERVAL).await;
        }

        let cancelled = self.cancelled.load(Ordering::SeqCst);
        if !cancelled {
            self.sessions.finish(self.channel_id);
        }
        if !cancelled && !message_gone && !self.lyrics.text.is_empty() {
            if let Err(e) = self.edit(&self.lyrics.text).await {
                debug!("Could not show full lyrics in {}: {}", self.channel_id, e);
            }
        }
        debug!("Lyrics sync in channel {} ended", self.channel_id);
    }
}
