//! Persistent notifications
//!
//! In-memory user alerts, keyed by notification id. Creating an id that
//! already exists replaces it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A persistent notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    /// Markdown body
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Whether `create` added a new notification or replaced one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Added,
    Updated,
}

#[derive(Debug, Default)]
pub struct PersistentNotifications {
    notifications: DashMap<String, Notification>,
}

impl PersistentNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a notification
    pub fn create(
        &self,
        notification_id: impl Into<String>,
        message: impl Into<String>,
        title: Option<String>,
    ) -> (Notification, UpdateType) {
        let notification_id = notification_id.into();
        let notification = Notification {
            notification_id: notification_id.clone(),
            message: message.into(),
            title,
            created_at: Utc::now(),
        };

        let previous = self
            .notifications
            .insert(notification_id.clone(), notification.clone());

        let update_type = if previous.is_some() {
            debug!("Updated notification: {}", notification_id);
            UpdateType::Updated
        } else {
            info!("Created notification: {}", notification_id);
            UpdateType::Added
        };

        (notification, update_type)
    }

    /// Dismiss a notification; dismissing an unknown id is a no-op
    pub fn dismiss(&self, notification_id: &str) -> Option<Notification> {
        let removed = self.notifications.remove(notification_id).map(|(_, n)| n);
        if removed.is_some() {
            info!("Dismissed notification: {}", notification_id);
        }
        removed
    }

    pub fn get(&self, notification_id: &str) -> Option<Notification> {
        self.notifications.get(notification_id).map(|n| n.clone())
    }

    /// All notifications, oldest first
    pub fn list(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> =
            self.notifications.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_replace() {
        let manager = PersistentNotifications::new();

        let (_, kind) = manager.create("kill", "Failed to stop A1", Some("Tautulli".into()));
        assert_eq!(kind, UpdateType::Added);

        let (n, kind) = manager.create("kill", "Failed to stop B1", None);
        assert_eq!(kind, UpdateType::Updated);
        assert_eq!(n.message, "Failed to stop B1");
        assert_eq!(manager.count(), 1);
    }

    #[test]
    fn test_dismiss() {
        let manager = PersistentNotifications::new();
        manager.create("a", "one", None);

        assert!(manager.dismiss("a").is_some());
        assert!(manager.dismiss("a").is_none());
        assert!(manager.list().is_empty());
    }
}
