use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::stats::Stats;

/// Outbound socket frame, discriminated by `op`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    VoiceUpdate {
        guild_id: String,
        session_id: String,
        event: Value,
    },
    Play {
        guild_id: String,
        track: String,
        start_time: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_time: Option<String>,
        volume: String,
        no_replace: bool,
        pause: bool,
    },
    Stop {
        guild_id: String,
    },
    Pause {
        guild_id: String,
        pause: bool,
    },
    Seek {
        guild_id: String,
        position: u64,
    },
    Volume {
        guild_id: String,
        volume: u16,
    },
    /// The whole filter set plus normalized volume; filter payloads are
    /// flattened in under their names.
    Filters {
        guild_id: String,
        volume: f32,
        #[serde(flatten)]
        filters: Map<String, Value>,
    },
    Equalizer {
        guild_id: String,
        bands: Vec<EqualizerBand>,
    },
    Destroy {
        guild_id: String,
    },
}

impl Command {
    /// The `op` string this command serializes under
    pub fn op(&self) -> &'static str {
        match self {
            Command::VoiceUpdate { .. } => "voiceUpdate",
            Command::Play { .. } => "play",
            Command::Stop { .. } => "stop",
            Command::Pause { .. } => "pause",
            Command::Seek { .. } => "seek",
            Command::Volume { .. } => "volume",
            Command::Filters { .. } => "filters",
            Command::Equalizer { .. } => "equalizer",
            Command::Destroy { .. } => "destroy",
        }
    }
}

/// One equalizer band adjustment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EqualizerBand {
    pub band: u8,
    pub gain: f32,
}

/// Inbound socket frame, discriminated by `op`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Incoming {
    #[serde(rename_all = "camelCase")]
    PlayerUpdate {
        guild_id: String,
        state: PlayerUpdateState,
    },
    Event(RawEvent),
    Stats(Stats),
    #[serde(other)]
    Unknown,
}

/// Positional state pushed by the server, in milliseconds
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct PlayerUpdateState {
    pub time: u64,
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub connected: Option<bool>,
}

/// Event frame payload, discriminated by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum RawEvent {
    #[serde(rename_all = "camelCase")]
    TrackStartEvent { guild_id: String, track: String },
    #[serde(rename_all = "camelCase")]
    TrackEndEvent {
        guild_id: String,
        track: String,
        reason: TrackEndReason,
    },
    #[serde(rename_all = "camelCase")]
    TrackExceptionEvent {
        guild_id: String,
        track: String,
        #[serde(default)]
        exception: Option<TrackException>,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TrackStuckEvent {
        guild_id: String,
        track: String,
        #[serde(default)]
        threshold_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    WebSocketClosedEvent {
        guild_id: String,
        code: u16,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        by_remote: bool,
    },
}

/// Why a track stopped playing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
    #[serde(other)]
    Unknown,
}

impl TrackEndReason {
    /// Whether a client would normally move on to the next queued track
    pub fn may_start_next(&self) -> bool {
        matches!(self, TrackEndReason::Finished | TrackEndReason::LoadFailed)
    }
}

/// Exception details attached to a track exception event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackException {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub cause: Option<String>,
}

impl TrackException {
    /// Older servers only send an `error` string
    pub(crate) fn resolve(exception: Option<TrackException>, error: Option<String>) -> Self {
        match exception {
            Some(exception) => exception,
            None => TrackException {
                message: error,
                severity: None,
                cause: None,
            },
        }
    }
}

// ========== REST ==========

/// `loadType` discriminator of a `/loadtracks` response
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadType {
    TrackLoaded,
    SearchResult,
    PlaylistLoaded,
    NoMatches,
    LoadFailed,
}

/// `/loadtracks` response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTracksResponse {
    pub load_type: LoadType,
    #[serde(default)]
    pub tracks: Vec<TrackData>,
    #[serde(default)]
    pub playlist_info: Option<PlaylistInfo>,
    #[serde(default)]
    pub exception: Option<TrackException>,
}

/// Encoded track handle plus its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackData {
    pub track: String,
    pub info: TrackInfo,
}

/// `/decodetrack` response: newer servers echo the handle, older ones return
/// the bare info object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DecodeTrackResponse {
    Full(TrackData),
    Info(TrackInfo),
}

impl DecodeTrackResponse {
    pub fn into_info(self) -> TrackInfo {
        match self {
            DecodeTrackResponse::Full(data) => data.info,
            DecodeTrackResponse::Info(info) => info,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    #[serde(default)]
    pub is_seekable: bool,
    #[serde(default)]
    pub author: String,
    /// Milliseconds
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_stream: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub selected_track: Option<i64>,
}
