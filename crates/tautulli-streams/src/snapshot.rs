//! The published result of one poll

use chrono::{DateTime, Utc};
use serde::Serialize;
use tautulli_api::{Activity, ErrorClass, ImageRequest, Session, TautulliError};

/// Outcome of the poll that produced a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollStatus {
    /// No poll has completed yet
    Pending,
    Ok,
    Failed { class: ErrorClass, error: String },
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Pending => "pending",
            PollStatus::Ok => "ok",
            PollStatus::Failed { .. } => "failed",
        }
    }
}

/// Server-wide stream counters; bandwidth in kbps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub stream_count: u64,
    pub stream_count_direct_play: u64,
    pub stream_count_direct_stream: u64,
    pub stream_count_transcode: u64,
    pub total_bandwidth: u64,
    pub lan_bandwidth: u64,
    pub wan_bandwidth: u64,
}

/// Sessions and counters from one poll, replaced wholesale on the next
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySnapshot {
    pub sessions: Vec<Session>,
    pub diagnostics: Diagnostics,
    pub fetched_at: DateTime<Utc>,
    pub status: PollStatus,
}

impl ActivitySnapshot {
    /// Snapshot published before the first poll
    pub fn pending() -> Self {
        Self {
            sessions: Vec::new(),
            diagnostics: Diagnostics::default(),
            fetched_at: Utc::now(),
            status: PollStatus::Pending,
        }
    }

    /// Empty snapshot for a failed poll
    pub fn failed(error: &TautulliError) -> Self {
        Self {
            sessions: Vec::new(),
            diagnostics: Diagnostics::default(),
            fetched_at: Utc::now(),
            status: PollStatus::Failed {
                class: error.class(),
                error: error.to_string(),
            },
        }
    }

    /// Normalize a successful `get_activity` reply for `entry_id`
    pub fn from_activity(entry_id: &str, activity: Activity) -> Self {
        let sessions: Vec<Session> = activity
            .sessions
            .into_iter()
            .map(|mut session| {
                session.image_url = session
                    .artwork()
                    .map(|img| ImageRequest::new(img).proxy_path(entry_id));
                session
            })
            .collect();

        let diagnostics = Diagnostics {
            stream_count: sessions.len() as u64,
            stream_count_direct_play: activity.stream_count_direct_play,
            stream_count_direct_stream: activity.stream_count_direct_stream,
            stream_count_transcode: activity.stream_count_transcode,
            total_bandwidth: activity.total_bandwidth,
            lan_bandwidth: activity.lan_bandwidth,
            wan_bandwidth: activity.wan_bandwidth,
        };

        Self {
            sessions,
            diagnostics,
            fetched_at: Utc::now(),
            status: PollStatus::Ok,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == PollStatus::Ok
    }

    pub fn contains_session(&self, session_id: &str) -> bool {
        self.sessions.iter().any(|s| s.session_id == session_id)
    }
}
