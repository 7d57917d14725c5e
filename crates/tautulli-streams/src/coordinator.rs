//! Polls Tautulli and publishes activity snapshots

use std::sync::Arc;

use tautulli_api::{ErrorClass, TautulliApi};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::snapshot::ActivitySnapshot;

/// Fetches `get_activity` for one entry and publishes the latest snapshot
///
/// Readers get an `Arc` to an immutable snapshot; each refresh swaps in a
/// new one.
pub struct SessionCoordinator {
    entry_id: String,
    api: Arc<dyn TautulliApi>,
    snapshot: watch::Sender<Arc<ActivitySnapshot>>,
}

impl SessionCoordinator {
    pub fn new(entry_id: impl Into<String>, api: Arc<dyn TautulliApi>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(ActivitySnapshot::pending()));
        Self {
            entry_id: entry_id.into(),
            api,
            snapshot,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn api(&self) -> Arc<dyn TautulliApi> {
        self.api.clone()
    }

    /// The most recently published snapshot
    pub fn snapshot(&self) -> Arc<ActivitySnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ActivitySnapshot>> {
        self.snapshot.subscribe()
    }

    /// Fetch activity once and publish the result
    ///
    /// Failures never propagate: they publish an empty snapshot marked
    /// failed.
    pub async fn refresh(&self) -> Arc<ActivitySnapshot> {
        let snapshot = match self.api.get_activity().await {
            Ok(activity) => {
                let snapshot = ActivitySnapshot::from_activity(&self.entry_id, activity);
                debug!(
                    entry_id = %self.entry_id,
                    sessions = snapshot.sessions.len(),
                    "Fetched Tautulli activity"
                );
                snapshot
            }
            Err(e) => {
                match e.class() {
                    ErrorClass::Authentication => warn!(
                        entry_id = %self.entry_id,
                        "Tautulli rejected the API key, treating as no sessions: {}", e
                    ),
                    _ => warn!(
                        entry_id = %self.entry_id,
                        "Failed to fetch Tautulli activity, treating as no sessions: {}", e
                    ),
                }
                ActivitySnapshot::failed(&e)
            }
        };

        let snapshot = Arc::new(snapshot);
        self.snapshot.send_replace(snapshot.clone());
        snapshot
    }
}
