//! Tautulli Active Streams
//!
//! Polls one or more Tautulli servers and mirrors their active Plex sessions
//! into `sensor.plex_session_<n>` slots, plus server-wide diagnostic
//! sensors. Registers the `tautulli_active_streams.kill_*` services that
//! terminate streams through Tautulli.
//!
//! Each loaded entry owns one poll task. A poll fetches `get_activity`,
//! publishes an immutable [`ActivitySnapshot`] and reconciles it onto the
//! entry's sensors; services read the latest snapshot without waiting on the
//! poller.

mod attributes;
mod coordinator;
mod format;
mod reconciler;
mod runtime;
mod sensors;
mod services;
mod snapshot;

pub use attributes::{DiagnosticSensor, PLACEHOLDER, SLOT_ICON};
pub use coordinator::SessionCoordinator;
pub use format::{format_hms, format_mbps, kbps_to_mbps};
pub use reconciler::{Assignment, Reconciler};
pub use runtime::{EntryRuntime, PollOutcome};
pub use services::{
    KillFailure, KillReport, DEFAULT_KILL_MESSAGE, SERVICE_KILL_ALL_STREAMS,
    SERVICE_KILL_SESSION_STREAM, SERVICE_KILL_USER_STREAM,
};
pub use snapshot::{ActivitySnapshot, Diagnostics, PollStatus};

use std::sync::Arc;

use dashmap::DashMap;
use tautulli_api::{TautulliApi, TautulliClient, TautulliError};
use tautulli_config::TautulliEntry;
use tautulli_core::EntityIdError;
use tautulli_hub::{Hub, ServiceError};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Service domain of this component
pub const DOMAIN: &str = "tautulli_active_streams";

/// Errors from setting up or unloading an entry
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("entry {0} is already loaded")]
    AlreadyLoaded(String),

    #[error("entry {0} is not loaded")]
    NotLoaded(String),

    #[error("could not create Tautulli client: {0}")]
    Client(#[from] TautulliError),

    #[error("could not register services: {0}")]
    Services(#[from] ServiceError),

    #[error("invalid entity id: {0}")]
    EntityId(#[from] EntityIdError),
}

pub(crate) struct LoadedEntry {
    pub(crate) runtime: Arc<EntryRuntime>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub(crate) type EntryMap = Arc<DashMap<String, LoadedEntry>>;

/// The component: loaded entries and their poll tasks
#[derive(Clone)]
pub struct TautulliStreams {
    hub: Hub,
    entries: EntryMap,
    /// Serializes setup and unload
    lifecycle: Arc<Mutex<()>>,
}

impl TautulliStreams {
    pub fn new(hub: Hub) -> Self {
        Self {
            hub,
            entries: Arc::new(DashMap::new()),
            lifecycle: Arc::new(Mutex::new(())),
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Set up `entry` against its configured Tautulli server
    pub async fn setup_entry(&self, entry: TautulliEntry) -> Result<(), SetupError> {
        let api = TautulliClient::new(
            &entry.data.url,
            entry.data.api_key.clone(),
            entry.data.verify_ssl,
        )?;
        self.setup_entry_with_api(entry, Arc::new(api)).await
    }

    /// Set up `entry` with the given API implementation
    ///
    /// Creates the sensors, registers the services when this is the first
    /// loaded entry, runs the first poll and starts the poll task. A failed
    /// first poll does not fail setup; the sensors stay idle until a later
    /// poll succeeds.
    #[instrument(skip(self, entry, api), fields(entry_id = %entry.entry_id))]
    pub async fn setup_entry_with_api(
        &self,
        entry: TautulliEntry,
        api: Arc<dyn TautulliApi>,
    ) -> Result<(), SetupError> {
        let _lifecycle = self.lifecycle.lock().await;

        let entry_id = entry.entry_id.clone();
        if self.entries.contains_key(&entry_id) {
            return Err(SetupError::AlreadyLoaded(entry_id));
        }

        let title = entry.title.clone();
        let runtime = Arc::new(EntryRuntime::new(entry, api, self.hub.states.clone())?);

        if self.entries.is_empty() {
            if let Err(e) = services::register_services(&self.hub, self.entries.clone()) {
                runtime.remove_sensors().await;
                return Err(e.into());
            }
        }

        if let PollOutcome::Completed(snapshot) = runtime.poll().await {
            if !snapshot.is_ok() {
                warn!(
                    "First poll of {} failed, sensors stay idle until Tautulli responds",
                    title
                );
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(runtime.clone().run(shutdown_rx));

        self.entries.insert(
            entry_id.clone(),
            LoadedEntry {
                runtime,
                shutdown,
                task,
            },
        );

        info!("Set up Tautulli entry {} ({})", title, entry_id);
        Ok(())
    }

    /// Stop the poll task of `entry_id` and remove its sensors
    ///
    /// Services are removed with the last entry.
    #[instrument(skip(self))]
    pub async fn unload_entry(&self, entry_id: &str) -> Result<(), SetupError> {
        let _lifecycle = self.lifecycle.lock().await;

        let (_, loaded) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| SetupError::NotLoaded(entry_id.to_string()))?;

        let _ = loaded.shutdown.send(true);
        if let Err(e) = loaded.task.await {
            warn!("Poll task of {} ended abnormally: {}", entry_id, e);
        }
        loaded.runtime.remove_sensors().await;

        if self.entries.is_empty() {
            let removed = self.hub.services.unregister_domain(DOMAIN);
            info!("Removed {} {} services", removed, DOMAIN);
        }

        info!("Unloaded Tautulli entry {}", entry_id);
        Ok(())
    }

    /// Unload `entry.entry_id` if loaded, then set it up again
    pub async fn reload_entry(&self, entry: TautulliEntry) -> Result<(), SetupError> {
        if self.entries.contains_key(&entry.entry_id) {
            self.unload_entry(&entry.entry_id).await?;
        }
        self.setup_entry(entry).await
    }

    /// Bring the loaded entries in line with `entries`
    ///
    /// Entries no longer listed are unloaded, changed entries reloaded and
    /// new ones set up. Returns the outcome per entry id.
    pub async fn sync_entries(
        &self,
        entries: Vec<TautulliEntry>,
    ) -> Vec<(String, Result<(), SetupError>)> {
        let mut results = Vec::new();

        for loaded_id in self.entry_ids() {
            if !entries.iter().any(|e| e.entry_id == loaded_id) {
                let result = self.unload_entry(&loaded_id).await;
                results.push((loaded_id, result));
            }
        }

        for entry in entries {
            let entry_id = entry.entry_id.clone();
            let result = match self.entry(&entry_id) {
                Some(current) if !current.needs_reload(&entry) => continue,
                Some(_) => self.reload_entry(entry).await,
                None => self.setup_entry(entry).await,
            };
            if let Err(e) = &result {
                warn!("Failed to load Tautulli entry {}: {}", entry_id, e);
            }
            results.push((entry_id, result));
        }

        results
    }

    /// Unload every entry
    pub async fn unload_all(&self) {
        for entry_id in self.entry_ids() {
            if let Err(e) = self.unload_entry(&entry_id).await {
                warn!("Failed to unload {}: {}", entry_id, e);
            }
        }
    }

    /// Loaded entry ids, sorted
    pub fn entry_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn entry(&self, entry_id: &str) -> Option<TautulliEntry> {
        self.runtime(entry_id).map(|r| r.entry().clone())
    }

    /// Latest snapshot of a loaded entry
    pub fn snapshot(&self, entry_id: &str) -> Option<Arc<ActivitySnapshot>> {
        self.runtime(entry_id).map(|r| r.coordinator().snapshot())
    }

    /// API client of a loaded entry, for the image proxy
    pub fn api(&self, entry_id: &str) -> Option<Arc<dyn TautulliApi>> {
        self.runtime(entry_id).map(|r| r.coordinator().api())
    }

    /// Poll `entry_id` now, outside its schedule
    pub async fn poll(&self, entry_id: &str) -> Option<PollOutcome> {
        let runtime = self.runtime(entry_id)?;
        Some(runtime.poll().await)
    }

    fn runtime(&self, entry_id: &str) -> Option<Arc<EntryRuntime>> {
        self.entries.get(entry_id).map(|e| e.runtime.clone())
    }
}
