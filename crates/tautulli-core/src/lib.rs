//! Core host types for the Tautulli Active Streams runtime
//!
//! This crate provides the small set of host types the rest
//! of the workspace is built on: EntityId, State, Context and ServiceCall.

mod context;
mod entity_id;
mod service_call;
mod state;

pub use context::Context;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use service_call::{ServiceCall, SupportsResponse};
pub use state::{Attributes, State, StateChange};

/// Longest state value stored as-is
pub const MAX_STATE_LENGTH: usize = 255;

/// Stored instead of a state longer than MAX_STATE_LENGTH
pub const STATE_UNKNOWN: &str = "unknown";

/// State of a sensor slot with no session assigned
pub const STATE_IDLE: &str = "idle";

/// Attribute keys shared by every entity
pub mod attrs {
    pub const FRIENDLY_NAME: &str = "friendly_name";
    pub const ICON: &str = "icon";
    pub const UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";
    pub const STATE_CLASS: &str = "state_class";
    pub const ENTITY_CATEGORY: &str = "entity_category";
}
