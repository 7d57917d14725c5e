//! Shared test helpers: an in-memory Tautulli and entry builders

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tautulli_api::{
    Activity, ImageData, ImageRequest, PlaybackState, Session, TautulliApi, TautulliError,
};
use tautulli_config::{ConnectionData, SlotAssignment, StreamOptions, TautulliEntry};
use tokio::sync::{Notify, Semaphore};

pub const API_KEY: &str = "SuperSecretKey123";

/// Load `tests/fixtures/<name>` as JSON
pub fn load_json_fixture(name: &str) -> serde_json::Value {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load fixture '{}' from {:?}: {}", name, path, e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture '{}' as JSON: {}", name, e))
}

/// The `data` of the recorded `get_activity` fixture
pub fn fixture_activity() -> Activity {
    let body = load_json_fixture("get_activity.json");
    serde_json::from_value(body["response"]["data"].clone()).unwrap()
}

pub fn session(id: &str, user: &str) -> Session {
    Session {
        session_id: id.to_string(),
        user: user.to_string(),
        username: user.to_lowercase(),
        full_title: format!("Title {}", id),
        state: PlaybackState::Playing,
        ..Default::default()
    }
}

pub fn activity(sessions: Vec<Session>) -> Activity {
    Activity {
        stream_count: sessions.len() as u64,
        sessions,
        ..Default::default()
    }
}

pub fn entry(entry_id: &str, num_sensors: usize, policy: SlotAssignment) -> TautulliEntry {
    TautulliEntry::new(
        entry_id,
        "Tautulli",
        ConnectionData {
            url: "http://tautulli.local:8181".to_string(),
            api_key: API_KEY.to_string(),
            verify_ssl: true,
        },
        StreamOptions {
            // Long enough that the background loop never fires during a test
            session_interval: 3600,
            num_sensors,
            advanced_attributes: false,
            slot_assignment: policy,
        },
    )
    .unwrap()
}

/// Scriptable in-memory Tautulli
#[derive(Default)]
pub struct FakeTautulli {
    activity: Mutex<Option<Result<Activity, TautulliError>>>,
    failing_sessions: Mutex<HashSet<String>>,
    terminated: Mutex<Vec<(String, String)>>,
    activity_calls: AtomicUsize,
    /// When set, `get_activity` waits for a permit
    gate: Option<Arc<Semaphore>>,
    pub started: Notify,
}

impl FakeTautulli {
    pub fn new(activity: Activity) -> Arc<Self> {
        let fake = Self::default();
        fake.set_activity(Ok(activity));
        Arc::new(fake)
    }

    pub fn gated(activity: Activity, gate: Arc<Semaphore>) -> Arc<Self> {
        let fake = Self {
            gate: Some(gate),
            ..Default::default()
        };
        fake.set_activity(Ok(activity));
        Arc::new(fake)
    }

    pub fn set_activity(&self, activity: Result<Activity, TautulliError>) {
        *self.activity.lock().unwrap() = Some(activity);
    }

    pub fn fail_terminate(&self, session_id: &str) {
        self.failing_sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string());
    }

    /// `(session_id, message)` of every successful terminate, sorted
    pub fn terminated(&self) -> Vec<(String, String)> {
        let mut calls = self.terminated.lock().unwrap().clone();
        calls.sort();
        calls
    }

    pub fn terminated_ids(&self) -> Vec<String> {
        self.terminated().into_iter().map(|(id, _)| id).collect()
    }

    pub fn activity_calls(&self) -> usize {
        self.activity_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TautulliApi for FakeTautulli {
    async fn get_activity(&self) -> Result<Activity, TautulliError> {
        self.activity_calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            // One permit per call
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.activity
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(TautulliError::Connection("no activity scripted".into())))
    }

    async fn terminate_session(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<(), TautulliError> {
        if self.failing_sessions.lock().unwrap().contains(session_id) {
            return Err(TautulliError::Api(format!(
                "No session found for session_id {}",
                session_id
            )));
        }
        self.terminated
            .lock()
            .unwrap()
            .push((session_id.to_string(), message.to_string()));
        Ok(())
    }

    async fn fetch_image(&self, request: &ImageRequest) -> Result<ImageData, TautulliError> {
        Ok(ImageData {
            bytes: request.img.as_bytes().to_vec(),
            content_type: "image/jpeg".to_string(),
        })
    }
}
