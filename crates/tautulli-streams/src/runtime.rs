//! Per-entry poll loop

use std::sync::Arc;
use std::time::Duration;

use tautulli_api::TautulliApi;
use tautulli_config::{TautulliEntry, MAX_SESSION_INTERVAL};
use tautulli_core::EntityIdError;
use tautulli_hub::StateStore;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::coordinator::SessionCoordinator;
use crate::sensors::EntrySensors;
use crate::snapshot::ActivitySnapshot;

/// Result of asking an entry to poll
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Completed(Arc<ActivitySnapshot>),
    /// Another poll was still running
    Skipped,
}

/// `session_interval` seconds, clamped to what config validation accepts
fn poll_period(session_interval: u64) -> Duration {
    Duration::from_secs(session_interval.clamp(1, MAX_SESSION_INTERVAL))
}

/// One period after `now`, or `now` if that instant is unrepresentable
fn first_tick(now: Instant, period: Duration) -> Instant {
    now.checked_add(period).unwrap_or(now)
}

/// A loaded entry: its coordinator plus the sensors it drives
pub struct EntryRuntime {
    entry: TautulliEntry,
    coordinator: SessionCoordinator,
    /// Held for the whole fetch-and-reconcile of one poll
    sensors: Mutex<EntrySensors>,
    states: Arc<StateStore>,
}

impl EntryRuntime {
    pub fn new(
        entry: TautulliEntry,
        api: Arc<dyn TautulliApi>,
        states: Arc<StateStore>,
    ) -> Result<Self, EntityIdError> {
        let sensors = EntrySensors::create(&states, &entry)?;
        Ok(Self {
            coordinator: SessionCoordinator::new(entry.entry_id.clone(), api),
            entry,
            sensors: Mutex::new(sensors),
            states,
        })
    }

    pub fn entry(&self) -> &TautulliEntry {
        &self.entry
    }

    pub fn entry_id(&self) -> &str {
        &self.entry.entry_id
    }

    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    /// Fetch activity and reconcile it onto the sensors, unless a poll is
    /// already running
    pub async fn poll(&self) -> PollOutcome {
        let Ok(mut sensors) = self.sensors.try_lock() else {
            debug!(entry_id = %self.entry_id(), "Previous poll still running, skipping");
            return PollOutcome::Skipped;
        };

        let snapshot = self.coordinator.refresh().await;
        sensors.update(&self.states, &snapshot);
        PollOutcome::Completed(snapshot)
    }

    /// Poll every `session_interval` seconds until `shutdown` flips or its
    /// sender is dropped
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = poll_period(self.entry.options.session_interval);
        let mut ticker = interval_at(first_tick(Instant::now(), period), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            entry_id = %self.entry_id(),
            interval_secs = period.as_secs(),
            "Starting Tautulli poll loop"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!(entry_id = %self.entry_id(), "Poll loop stopped");
    }

    /// Drop every sensor of this entry from the state store
    pub async fn remove_sensors(&self) {
        self.sensors.lock().await.remove(&self.states);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_period_is_clamped() {
        assert_eq!(poll_period(0), Duration::from_secs(1));
        assert_eq!(poll_period(10), Duration::from_secs(10));
        assert_eq!(poll_period(u64::MAX / 2), Duration::from_secs(86_400));
    }

    #[test]
    fn test_first_tick_never_overflows() {
        let now = Instant::now();
        assert_eq!(first_tick(now, Duration::from_secs(5)), now + Duration::from_secs(5));
        assert_eq!(first_tick(now, Duration::MAX), now);
    }
}
