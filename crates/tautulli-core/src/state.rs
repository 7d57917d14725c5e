//! State type representing an entity's current state

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId, MAX_STATE_LENGTH, STATE_UNKNOWN};

/// Ordered attribute map; insertion order is preserved in API output
pub type Attributes = IndexMap<String, serde_json::Value>;

/// The state of an entity at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub entity_id: EntityId,

    /// The state value (e.g., "playing", "idle", "3")
    pub state: String,

    #[serde(default)]
    pub attributes: Attributes,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state or its attributes were last written
    pub last_updated: DateTime<Utc>,

    pub context: Context,
}

impl State {
    /// Create a new state with current timestamp
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: Attributes,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: clamp_state(state.into()),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Create an updated state, preserving last_changed if the value is the same
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: Attributes,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let new_state = clamp_state(new_state.into());
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
            context,
        }
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and context are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

fn clamp_state(state: String) -> String {
    if state.len() > MAX_STATE_LENGTH {
        STATE_UNKNOWN.to_string()
    } else {
        state
    }
}

/// A state transition published by the state store
#[derive(Debug, Clone, Serialize)]
pub struct StateChange {
    pub entity_id: EntityId,
    pub old_state: Option<State>,
    pub new_state: Option<State>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor() -> EntityId {
        EntityId::new("sensor", "plex_session_1").unwrap()
    }

    #[test]
    fn test_update_keeps_last_changed_for_same_value() {
        let first = State::new(sensor(), "playing", Attributes::new(), Context::new());
        let mut attrs = Attributes::new();
        attrs.insert("progress_percent".into(), json!(40));
        let second = first.with_update("playing", attrs, Context::new());

        assert_eq!(second.last_changed, first.last_changed);
        assert!(second.last_updated >= first.last_updated);
        assert_eq!(second.attribute::<u32>("progress_percent"), Some(40));
    }

    #[test]
    fn test_update_moves_last_changed_for_new_value() {
        let first = State::new(sensor(), "playing", Attributes::new(), Context::new());
        let second = first.with_update("idle", Attributes::new(), Context::new());
        assert_eq!(second.state, "idle");
        assert!(second.last_changed >= first.last_changed);
    }

    #[test]
    fn test_overlong_state_becomes_unknown() {
        let state = State::new(sensor(), "x".repeat(300), Attributes::new(), Context::new());
        assert_eq!(state.state, STATE_UNKNOWN);
    }
}
