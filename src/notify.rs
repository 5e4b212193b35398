//! Best-effort milestone notification channel.
//!
//! Progression milestones are announced through a broadcast hub. Delivery is
//! lossy: a send with no connected subscriber is dropped, and no failure here
//! can reach the caller. The persistence write that produced the milestone has
//! already committed by the time a notification is dispatched.

use tokio::sync::broadcast;

#[derive(Clone, Debug, serde::Serialize)]
pub struct Notification {
    /// Target user, or `None` for a fan-out notice to every observer.
    pub user_id: Option<i32>,
    pub event: String,
    pub payload: serde_json::Value,
}

#[derive(Clone)]
pub struct NotificationHub {
    tx: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send a milestone to one user's channel. Never fails.
    pub fn notify(&self, user_id: i32, event: &str, payload: serde_json::Value) {
        self.send(Notification {
            user_id: Some(user_id),
            event: event.to_owned(),
            payload,
        });
    }

    /// Fan out a notice to every listening observer. Never fails.
    pub fn broadcast(&self, event: &str, payload: serde_json::Value) {
        self.send(Notification {
            user_id: None,
            event: event.to_owned(),
            payload,
        });
    }

    fn send(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            tracing::debug!("notification dropped, no subscribers: {e}");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
