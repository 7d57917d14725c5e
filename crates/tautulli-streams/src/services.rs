//! Kill-stream services
//!
//! Each service resolves its targets from the latest snapshot of every
//! selected entry, then asks Tautulli to terminate them all concurrently.
//! Individual failures never abort the call; they are collected into the
//! service response and one persistent notification.

use std::sync::Arc;

use futures::future::join_all;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tautulli_core::{ServiceCall, SupportsResponse};
use tautulli_hub::{
    Hub, PersistentNotifications, ServiceDescription, ServiceError, ServiceResult,
};
use tracing::{error, info, warn};

use crate::runtime::EntryRuntime;
use crate::{EntryMap, DOMAIN};

pub const SERVICE_KILL_ALL_STREAMS: &str = "kill_all_streams";
pub const SERVICE_KILL_USER_STREAM: &str = "kill_user_stream";
pub const SERVICE_KILL_SESSION_STREAM: &str = "kill_session_stream";

/// Shown to viewers when no message is given
pub const DEFAULT_KILL_MESSAGE: &str = "Stream ended by admin.";

#[derive(Debug, Deserialize)]
struct KillAllData {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    entry_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KillUserData {
    user: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    entry_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KillSessionData {
    session_id: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    entry_id: Option<String>,
}

/// Outcome of one kill service call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KillReport {
    pub requested: usize,
    pub terminated: Vec<String>,
    pub failed: Vec<KillFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KillFailure {
    pub entry_id: String,
    pub session_id: String,
    pub error: String,
}

struct Target {
    runtime: Arc<EntryRuntime>,
    session_id: String,
}

/// Ordered, de-duplicated kill targets
#[derive(Default)]
struct Targets {
    seen: IndexSet<(String, String)>,
    targets: Vec<Target>,
}

impl Targets {
    fn push(&mut self, runtime: &Arc<EntryRuntime>, session_id: &str) {
        let key = (runtime.entry_id().to_string(), session_id.to_string());
        if self.seen.insert(key) {
            self.targets.push(Target {
                runtime: runtime.clone(),
                session_id: session_id.to_string(),
            });
        }
    }

    fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

fn message_or_default(message: Option<String>) -> String {
    message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_KILL_MESSAGE.to_string())
}

/// Loaded entries, optionally narrowed to one, in entry id order
fn select_entries(
    entries: &EntryMap,
    entry_id: Option<&str>,
) -> Result<Vec<Arc<EntryRuntime>>, ServiceError> {
    let mut selected: Vec<Arc<EntryRuntime>> = match entry_id {
        Some(id) => {
            let runtime = entries
                .get(id)
                .map(|loaded| loaded.runtime.clone())
                .ok_or_else(|| {
                    ServiceError::InvalidData(format!("unknown Tautulli entry: {}", id))
                })?;
            vec![runtime]
        }
        None => entries.iter().map(|loaded| loaded.runtime.clone()).collect(),
    };
    selected.sort_by(|a, b| a.entry_id().cmp(b.entry_id()));
    Ok(selected)
}

async fn terminate(targets: Targets, message: &str) -> KillReport {
    let requested = targets.targets.len();
    let results = join_all(targets.targets.into_iter().map(|target| async move {
        let result = target
            .runtime
            .coordinator()
            .api()
            .terminate_session(&target.session_id, message)
            .await;
        (target, result)
    }))
    .await;

    let mut report = KillReport {
        requested,
        ..Default::default()
    };
    for (target, result) in results {
        let entry_id = target.runtime.entry_id().to_string();
        match result {
            Ok(()) => {
                info!(entry_id = %entry_id, session_id = %target.session_id, "Terminated stream");
                report.terminated.push(target.session_id);
            }
            Err(e) => {
                error!(
                    entry_id = %entry_id,
                    session_id = %target.session_id,
                    "Failed to terminate stream: {}", e
                );
                report.failed.push(KillFailure {
                    entry_id,
                    session_id: target.session_id,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

/// Raise one notification listing every failed target
fn notify_failures(
    notifications: &PersistentNotifications,
    call: &ServiceCall,
    report: &KillReport,
) {
    if report.failed.is_empty() {
        return;
    }

    let mut message = format!(
        "{} of {} streams could not be ended by `{}`:\n",
        report.failed.len(),
        report.requested,
        call.service_id()
    );
    for failure in &report.failed {
        message.push_str(&format!(
            "\n- `{}` on {}: {}",
            failure.session_id, failure.entry_id, failure.error
        ));
    }

    notifications.create(
        format!("{}_{}_{}", DOMAIN, call.service, call.context.id),
        message,
        Some("Tautulli Active Streams".to_string()),
    );
}

fn respond(
    notifications: &PersistentNotifications,
    call: &ServiceCall,
    report: KillReport,
) -> ServiceResult {
    notify_failures(notifications, call, &report);
    let response =
        serde_json::to_value(&report).map_err(|e| ServiceError::CallFailed(e.to_string()))?;
    Ok(Some(response))
}

fn invalid_data(e: serde_json::Error) -> ServiceError {
    ServiceError::InvalidData(e.to_string())
}

pub(crate) async fn kill_all_streams(
    entries: &EntryMap,
    notifications: &PersistentNotifications,
    call: ServiceCall,
) -> ServiceResult {
    let data: KillAllData = call.parse_data().map_err(invalid_data)?;
    let message = message_or_default(data.message);

    let mut targets = Targets::default();
    for runtime in select_entries(entries, data.entry_id.as_deref())? {
        let snapshot = runtime.coordinator().snapshot();
        for session in &snapshot.sessions {
            if !session.session_id.is_empty() {
                targets.push(&runtime, &session.session_id);
            }
        }
    }

    if targets.is_empty() {
        info!("No active streams to terminate");
    }
    let report = terminate(targets, &message).await;
    respond(notifications, &call, report)
}

pub(crate) async fn kill_user_stream(
    entries: &EntryMap,
    notifications: &PersistentNotifications,
    call: ServiceCall,
) -> ServiceResult {
    let data: KillUserData = call.parse_data().map_err(invalid_data)?;
    let user = data.user.trim().to_lowercase();
    let message = message_or_default(data.message);

    let mut targets = Targets::default();
    for runtime in select_entries(entries, data.entry_id.as_deref())? {
        let snapshot = runtime.coordinator().snapshot();
        for session in &snapshot.sessions {
            if !session.session_id.is_empty() && session.belongs_to(&user) {
                targets.push(&runtime, &session.session_id);
            }
        }
    }

    if targets.is_empty() {
        warn!(user = %user, "No active streams found for user");
    }
    let report = terminate(targets, &message).await;
    respond(notifications, &call, report)
}

pub(crate) async fn kill_session_stream(
    entries: &EntryMap,
    notifications: &PersistentNotifications,
    call: ServiceCall,
) -> ServiceResult {
    let data: KillSessionData = call.parse_data().map_err(invalid_data)?;
    let session_id = data.session_id.trim().to_string();
    let message = message_or_default(data.message);

    let selected = select_entries(entries, data.entry_id.as_deref())?;
    let mut targets = Targets::default();
    for runtime in &selected {
        if runtime.coordinator().snapshot().contains_session(&session_id) {
            targets.push(runtime, &session_id);
        }
    }

    if targets.is_empty() {
        warn!(
            session_id = %session_id,
            "Session not in the latest activity, sending terminate anyway"
        );
        for runtime in &selected {
            targets.push(runtime, &session_id);
        }
    }

    let report = terminate(targets, &message).await;
    respond(notifications, &call, report)
}

fn entry_id_schema() -> Value {
    json!({"type": "string", "minLength": 1})
}

fn kill_all_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "message": {"type": "string"},
            "entry_id": entry_id_schema()
        },
        "additionalProperties": false
    })
}

fn kill_user_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user": {"type": "string", "pattern": "\\S"},
            "message": {"type": "string"},
            "entry_id": entry_id_schema()
        },
        "required": ["user"],
        "additionalProperties": false
    })
}

fn kill_session_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "session_id": {"type": "string", "pattern": "\\S"},
            "message": {"type": "string"},
            "entry_id": entry_id_schema()
        },
        "required": ["session_id"],
        "additionalProperties": false
    })
}

fn description(service: &str, name: &str, text: &str, schema: Value) -> ServiceDescription {
    ServiceDescription {
        domain: DOMAIN.to_string(),
        service: service.to_string(),
        name: Some(name.to_string()),
        description: Some(text.to_string()),
        schema: Some(schema),
        supports_response: SupportsResponse::Optional,
    }
}

/// Register the three kill services against `entries`
pub(crate) fn register_services(hub: &Hub, entries: EntryMap) -> Result<(), ServiceError> {
    let (e, n) = (entries.clone(), hub.notifications.clone());
    hub.services.register(
        description(
            SERVICE_KILL_ALL_STREAMS,
            "Kill all streams",
            "Terminate every active Plex stream",
            kill_all_schema(),
        ),
        move |call: ServiceCall| {
            let (entries, notifications) = (e.clone(), n.clone());
            async move { kill_all_streams(&entries, &notifications, call).await }
        },
    )?;

    let (e, n) = (entries.clone(), hub.notifications.clone());
    hub.services.register(
        description(
            SERVICE_KILL_USER_STREAM,
            "Kill user streams",
            "Terminate every active stream of one user",
            kill_user_schema(),
        ),
        move |call: ServiceCall| {
            let (entries, notifications) = (e.clone(), n.clone());
            async move { kill_user_stream(&entries, &notifications, call).await }
        },
    )?;

    let (e, n) = (entries, hub.notifications.clone());
    hub.services.register(
        description(
            SERVICE_KILL_SESSION_STREAM,
            "Kill session stream",
            "Terminate one stream by session id",
            kill_session_schema(),
        ),
        move |call: ServiceCall| {
            let (entries, notifications) = (e.clone(), n.clone());
            async move { kill_session_stream(&entries, &notifications, call).await }
        },
    )?;

    info!("Registered {} services", DOMAIN);
    Ok(())
}
