//! Entity state storage
//!
//! Holds the current state of every entity and broadcasts each transition to
//! subscribers (the REST API, tests).

use std::collections::HashSet;
use std::sync::Mutex;

use dashmap::DashMap;
use tautulli_core::{Attributes, Context, EntityId, State, StateChange};
use tokio::sync::broadcast;
use tracing::{debug, instrument, trace};

/// Capacity of the state change channel
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// The state store tracks all entity states
pub struct StateStore {
    /// All entity states keyed by entity_id string
    states: DashMap<String, State>,
    /// Entity ids handed out by `reserve_entity_id` and not yet released
    reserved: Mutex<HashSet<String>>,
    changes: broadcast::Sender<StateChange>,
}

impl StateStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            states: DashMap::new(),
            reserved: Mutex::new(HashSet::new()),
            changes,
        }
    }

    /// Set the state of an entity
    ///
    /// `last_changed` only moves when the state value differs from the
    /// previous one. A change is broadcast unless value and attributes are
    /// both unchanged.
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: Attributes,
        context: Context,
    ) -> State {
        let key = entity_id.to_string();
        let old_state = self.states.get(&key).map(|s| s.clone());

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context),
            None => State::new(entity_id.clone(), state, attributes, context),
        };

        let unchanged = old_state.as_ref() == Some(&new_state);
        trace!(state = %new_state.state, unchanged, "Setting entity state");

        self.states.insert(key, new_state.clone());

        if !unchanged {
            // No receivers is fine
            let _ = self.changes.send(StateChange {
                entity_id,
                old_state,
                new_state: Some(new_state.clone()),
            });
        }

        new_state
    }

    /// Get the current state of an entity
    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Get the state value as a string, or None if entity doesn't exist
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.get_state(entity_id).as_deref() == Some(state)
    }

    /// All states, sorted by entity id
    pub fn all(&self) -> Vec<State> {
        let mut states: Vec<State> = self.states.iter().map(|r| r.value().clone()).collect();
        states.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        states
    }

    /// Pick a free entity id based on `suggested`, appending `_2`, `_3`, ...
    /// on collision, and hold it until `remove` is called for it.
    pub fn reserve_entity_id(&self, suggested: &EntityId) -> EntityId {
        let mut reserved = self
            .reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut candidate = suggested.clone();
        let mut n = 2;
        loop {
            let key = candidate.to_string();
            if !reserved.contains(&key) && !self.states.contains_key(&key) {
                reserved.insert(key);
                return candidate;
            }
            candidate = suggested.with_suffix(n);
            n += 1;
        }
    }

    /// Remove an entity's state and release its reservation
    #[instrument(skip(self, _context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, _context: Context) -> Option<State> {
        let key = entity_id.to_string();
        let old_state = self.states.remove(&key).map(|(_, s)| s);

        self.reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&key);

        if let Some(state) = &old_state {
            debug!("Removed entity state");
            let _ = self.changes.send(StateChange {
                entity_id: entity_id.clone(),
                old_state: Some(state.clone()),
                new_state: None,
            });
        }

        old_state
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor(object_id: &str) -> EntityId {
        EntityId::new("sensor", object_id).unwrap()
    }

    #[test]
    fn test_set_and_get_state() {
        let store = StateStore::new();
        let mut attrs = Attributes::new();
        attrs.insert("user".into(), json!("alice"));

        let state = store.set(sensor("plex_session_1"), "playing", attrs.clone(), Context::new());
        assert_eq!(state.state, "playing");

        let fetched = store.get("sensor.plex_session_1").unwrap();
        assert_eq!(fetched.attributes, attrs);
        assert!(store.is_state("sensor.plex_session_1", "playing"));
        assert!(!store.is_state("sensor.plex_session_2", "playing"));
    }

    #[test]
    fn test_change_broadcast_skips_identical_writes() {
        let store = StateStore::new();
        let mut rx = store.subscribe();

        store.set(sensor("a"), "idle", Attributes::new(), Context::new());
        store.set(sensor("a"), "idle", Attributes::new(), Context::new());
        store.set(sensor("a"), "playing", Attributes::new(), Context::new());

        let first = rx.try_recv().unwrap();
        assert!(first.old_state.is_none());
        let second = rx.try_recv().unwrap();
        assert_eq!(second.new_state.unwrap().state, "playing");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_reserve_entity_id_appends_suffix() {
        let store = StateStore::new();
        let base = sensor("plex_session_1");

        let first = store.reserve_entity_id(&base);
        let second = store.reserve_entity_id(&base);
        let third = store.reserve_entity_id(&base);

        assert_eq!(first.to_string(), "sensor.plex_session_1");
        assert_eq!(second.to_string(), "sensor.plex_session_1_2");
        assert_eq!(third.to_string(), "sensor.plex_session_1_3");

        store.remove(&second, Context::new());
        assert_eq!(
            store.reserve_entity_id(&base).to_string(),
            "sensor.plex_session_1_2"
        );
    }

    #[test]
    fn test_remove_and_sorted_all() {
        let store = StateStore::new();
        store.set(sensor("b"), "1", Attributes::new(), Context::new());
        store.set(sensor("a"), "2", Attributes::new(), Context::new());
        store.set(
            EntityId::new("button", "refresh").unwrap(),
            "unknown",
            Attributes::new(),
            Context::new(),
        );

        let all = store.all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].entity_id.to_string(), "button.refresh");
        assert_eq!(all[1].entity_id.to_string(), "sensor.a");

        assert!(store.remove(&sensor("a"), Context::new()).is_some());
        assert!(store.remove(&sensor("a"), Context::new()).is_none());
        assert_eq!(store.entity_count(), 2);
    }
}
