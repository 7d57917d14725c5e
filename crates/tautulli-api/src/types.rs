//! `get_activity` payload types

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::de;

/// Playback state of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Buffering,
    #[default]
    Unknown,
}

impl PlaybackState {
    pub fn from_tautulli(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "playing" => PlaybackState::Playing,
            "paused" => PlaybackState::Paused,
            "buffering" => PlaybackState::Buffering,
            _ => PlaybackState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Buffering => "buffering",
            PlaybackState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One active stream as reported by Tautulli
///
/// Text fields that Tautulli leaves out or sends as null are empty strings.
/// Fields without a typed counterpart are kept in `extra` in response order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Session {
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub session_id: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub session_key: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub user: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub username: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub friendly_name: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub full_title: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub grandparent_title: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub media_type: String,
    #[serde(default, deserialize_with = "de::lenient_state")]
    pub state: PlaybackState,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub player: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub product: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub device: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub platform: String,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub progress_percent: f64,
    /// kbps
    #[serde(default, deserialize_with = "de::lenient_opt_u64")]
    pub bandwidth: Option<u64>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub location: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub ip_address: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub transcode_decision: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub video_resolution: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub stream_video_resolution: String,
    #[serde(default, deserialize_with = "de::lenient_opt_string")]
    pub thumb: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_opt_string")]
    pub grandparent_thumb: Option<String>,
    /// Milliseconds into the item
    #[serde(default, deserialize_with = "de::lenient_opt_u64")]
    pub view_offset: Option<u64>,
    /// Milliseconds
    #[serde(default, deserialize_with = "de::lenient_opt_u64")]
    pub stream_duration: Option<u64>,
    /// Epoch seconds
    #[serde(default, deserialize_with = "de::lenient_opt_u64")]
    pub start_time_raw: Option<u64>,

    /// Credential-free artwork path, filled in after the fetch
    #[serde(skip)]
    pub image_url: Option<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Session {
    /// Artwork to proxy: the show poster for episodes, the item thumb otherwise
    pub fn artwork(&self) -> Option<&str> {
        if self.media_type == "episode" {
            if let Some(thumb) = self.grandparent_thumb.as_deref() {
                return Some(thumb);
            }
        }
        self.thumb.as_deref().or(self.grandparent_thumb.as_deref())
    }

    /// Whether `needle` (already trimmed and lowercased) occurs in this
    /// session's user, username or friendly name
    pub fn belongs_to(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        [&self.user, &self.username, &self.friendly_name]
            .iter()
            .any(|name| name.to_lowercase().contains(needle))
    }
}

/// Decoded `get_activity` data
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Activity {
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub stream_count: u64,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub stream_count_direct_play: u64,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub stream_count_direct_stream: u64,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub stream_count_transcode: u64,
    /// kbps
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub total_bandwidth: u64,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub lan_bandwidth: u64,
    #[serde(default, deserialize_with = "de::lenient_u64")]
    pub wan_bandwidth: u64,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub sessions: Vec<Session>,
}

/// `{"response": {"result", "message", "data"}}`
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub response: ResponseBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseBody {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
}
