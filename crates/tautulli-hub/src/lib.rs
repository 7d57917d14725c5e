//! Host runtime for Tautulli Active Streams
//!
//! Components publish entity state into the [`StateStore`], register
//! callable services with the [`ServiceRegistry`], and raise user-facing
//! alerts through [`PersistentNotifications`]. [`Hub`] bundles the three so
//! they can be handed to a component as one value.

mod persistent_notification;
mod service_registry;
mod state_store;

pub use persistent_notification::{Notification, PersistentNotifications, UpdateType};
pub use service_registry::{
    ServiceDescription, ServiceError, ServiceFuture, ServiceHandler, ServiceRegistry,
    ServiceResult,
};
pub use state_store::StateStore;

use std::sync::Arc;

/// Shared handles to the host runtime
#[derive(Clone, Default)]
pub struct Hub {
    pub states: Arc<StateStore>,
    pub services: Arc<ServiceRegistry>,
    pub notifications: Arc<PersistentNotifications>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }
}
