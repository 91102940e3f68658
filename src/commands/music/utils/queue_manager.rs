use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, UserId};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use super::filters::FilterPreset;

/// A resolved, playable track plus who asked for it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Track {
    /// Opaque base64 blob the audio node plays from
    pub encoded: String,
    pub identifier: String,
    pub title: String,
    pub author: String,
    pub length_ms: u64,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub is_stream: bool,
    pub is_seekable: bool,
    pub source_name: String,
    #[serde(default)]
    pub requester: Option<UserId>,
}

impl Track {
    pub fn length(&self) -> Duration {
        Duration::from_millis(self.length_ms)
    }

    pub fn with_requester(mut self, requester: UserId) -> Self {
        self.requester = Some(requester);
        self
    }

    /// Same underlying track, whoever requested it.
    pub fn is_same(&self, other: &Track) -> bool {
        if !self.encoded.is_empty() && self.encoded == other.encoded {
            return true;
        }
        !self.identifier.is_empty() && self.identifier == other.identifier
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl LoopMode {
    pub fn next(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Track,
            LoopMode::Track => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::Track => "track",
            LoopMode::Queue => "queue",
        }
    }
}

/// Why the audio node stopped a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl EndReason {
    /// Maps the Lavalink `reason` field.
    pub fn from_wire(reason: &str) -> Self {
        match reason.to_ascii_lowercase().as_str() {
            "finished" => EndReason::Finished,
            "loadfailed" | "load_failed" => EndReason::LoadFailed,
            "stopped" => EndReason::Stopped,
            "replaced" => EndReason::Replaced,
            _ => EndReason::Cleanup,
        }
    }
}

/// What to do with the queue once a track ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndAction {
    Ignore,
    TryFallback,
    ClearAndAdvance,
    Replay,
    RequeueAndAdvance,
    Advance,
}

pub fn end_action(reason: EndReason, loop_mode: LoopMode) -> EndAction {
    match (reason, loop_mode) {
        (EndReason::Replaced, _) => EndAction::Ignore,
        (EndReason::LoadFailed, _) => EndAction::TryFallback,
        (EndReason::Stopped, _) => EndAction::ClearAndAdvance,
        (EndReason::Finished, LoopMode::Track) => EndAction::Replay,
        (EndReason::Finished, LoopMode::Queue) => EndAction::RequeueAndAdvance,
        (EndReason::Finished, LoopMode::Off) => EndAction::Advance,
        (EndReason::Cleanup, _) => EndAction::Advance,
    }
}

/// The portable part of a guild's player, used across rebuilds and for saved queues.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
    pub loop_mode: LoopMode,
    pub volume: u16,
    pub text_channel: Option<ChannelId>,
    #[serde(with = "humantime_serde", default)]
    pub position: Duration,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.upcoming.is_empty()
    }

    /// Every track, current first.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.current.iter().chain(self.upcoming.iter())
    }
}

/// A page of the upcoming queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePage<'a> {
    pub page: usize,
    pub total_pages: usize,
    /// 1-based index of the first entry
    pub offset: usize,
    pub tracks: Vec<&'a Track>,
}

pub const DEFAULT_VOLUME: u16 = 100;

/// The last exception the audio node reported for a guild.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackFailure {
    pub message: String,
    pub severity: String,
}

/// Queue and player bookkeeping for one guild.
#[derive(Debug, Clone)]
pub struct GuildQueue {
    pub current: Option<Track>,
    pub upcoming: VecDeque<Track>,
    pub loop_mode: LoopMode,
    pub volume: u16,
    pub text_channel: Option<ChannelId>,
    pub voice_channel: Option<ChannelId>,
    pub paused: bool,
    pub last_error: Option<TrackFailure>,
    pub fallback_attempts: HashSet<String>,
    pub fallback_in_progress: bool,
    pub active_filter: Option<FilterPreset>,
    pub rebuilding: bool,
}

impl Default for GuildQueue {
    fn default() -> Self {
        Self {
            current: None,
            upcoming: VecDeque::new(),
            loop_mode: LoopMode::Off,
            volume: DEFAULT_VOLUME,
            text_channel: None,
            voice_channel: None,
            paused: false,
            last_error: None,
            fallback_attempts: HashSet::new(),
            fallback_in_progress: false,
            active_filter: None,
            rebuilding: false,
        }
    }
}

impl GuildQueue {
    pub fn new(text_channel: Option<ChannelId>) -> Self {
        Self {
            text_channel,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upcoming.is_empty()
    }

    pub fn len(&self) -> usize {
        self.upcoming.len()
    }

    /// Appends a track and returns its 1-based position in the upcoming queue.
    pub fn enqueue(&mut self, track: Track) -> usize {
        self.upcoming.push_back(track);
        self.upcoming.len()
    }

    /// Appends every track and returns the position of the first one.
    pub fn enqueue_many(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let first = self.upcoming.len() + 1;
        self.upcoming.extend(tracks);
        first
    }

    pub fn push_front(&mut self, track: Track) {
        self.upcoming.push_front(track);
    }

    /// Pops the next track into `current`.
    pub fn advance(&mut self) -> Option<Track> {
        self.current = self.upcoming.pop_front();
        self.current.clone()
    }

    pub fn peek_next(&self) -> Option<&Track> {
        self.upcoming.front()
    }

    /// Drops everything before the 1-based `position` so that track is next.
    /// Returns the dropped tracks for [`GuildQueue::restore_front`].
    pub fn skip_to(&mut self, position: usize) -> Option<Vec<Track>> {
        if position == 0 || position > self.upcoming.len() {
            return None;
        }
        Some(self.upcoming.drain(..position - 1).collect())
    }

    pub fn restore_front(&mut self, tracks: Vec<Track>) {
        for track in tracks.into_iter().rev() {
            self.upcoming.push_front(track);
        }
    }

    /// Removes the track at the 1-based `position`.
    pub fn remove(&mut self, position: usize) -> Option<Track> {
        if position == 0 {
            return None;
        }
        self.upcoming.remove(position - 1)
    }

    /// Empties the upcoming queue and returns how many tracks were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.upcoming.len();
        self.upcoming.clear();
        count
    }

    pub fn shuffle(&mut self) {
        self.upcoming.make_contiguous().shuffle(&mut rand::rng());
    }

    /// Length of everything still to play, current track included. Streams count as zero.
    pub fn total_duration(&self) -> Duration {
        self.current
            .iter()
            .chain(self.upcoming.iter())
            .filter(|t| !t.is_stream)
            .map(Track::length)
            .sum()
    }

    /// Time until the track at 1-based `position` starts: the rest of the current track
    /// plus every upcoming track before it.
    pub fn eta_for(&self, position: usize, current_position: Duration) -> Duration {
        let remaining_current = self
            .current
            .as_ref()
            .filter(|t| !t.is_stream)
            .map(|t| t.length().saturating_sub(current_position))
            .unwrap_or_default();

        let ahead: Duration = self
            .upcoming
            .iter()
            .take(position.saturating_sub(1))
            .filter(|t| !t.is_stream)
            .map(Track::length)
            .sum();

        remaining_current + ahead
    }

    /// 0-based page of the upcoming queue; out-of-range pages clamp to the last one.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage<'_> {
        let per_page = per_page.max(1);
        let total_pages = self.upcoming.len().div_ceil(per_page).max(1);
        let page = page.min(total_pages - 1);
        let start = (page * per_page).min(self.upcoming.len());
        let end = (start + per_page).min(self.upcoming.len());

        QueuePage {
            page,
            total_pages,
            offset: start + 1,
            tracks: self.upcoming.range(start..end).collect(),
        }
    }

    pub fn snapshot(&self, position: Duration) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current.clone(),
            upcoming: self.upcoming.iter().cloned().collect(),
            loop_mode: self.loop_mode,
            volume: self.volume,
            text_channel: self.text_channel,
            position,
        }
    }

    /// Puts the snapshot's queue back. `current` is cleared; callers decide whether the
    /// snapshot's current track is requeued.
    pub fn restore(&mut self, snapshot: QueueSnapshot, requeue_current: bool) {
        self.upcoming = snapshot.upcoming.into();
        if requeue_current {
            if let Some(track) = snapshot.current {
                self.upcoming.push_front(track);
            }
        }
        self.current = None;
        self.loop_mode = snapshot.loop_mode;
        self.volume = snapshot.volume;
        if snapshot.text_channel.is_some() {
            self.text_channel = snapshot.text_channel;
        }
    }
}
