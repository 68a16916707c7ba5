//! User-visible notifications.
//!
//! Nothing in the core returns an error to the presentation layer. Every
//! failure is turned into a [`Notification`] and broadcast to whoever listens
//! (the host typically shows it as an alert).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Default capacity of the notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The remote feed reported a fault while subscribed, or refused the
    /// subscription.
    Subscription,
    /// An append was rejected or the store was unreachable.
    RemoteWrite,
    /// The local cache could not be read.
    CacheRead,
    /// The local cache could not be written.
    CacheWrite,
    /// A send was attempted while disconnected.
    Offline,
    /// The draft had nothing to send or failed validation.
    InvalidDraft,
}

impl NotificationKind {
    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::Subscription => "Error fetching messages",
            NotificationKind::RemoteWrite => "Failed to send message",
            NotificationKind::CacheRead => "Error loading messages from cache",
            NotificationKind::CacheWrite => "Error caching messages",
            NotificationKind::Offline => "You're offline. Unable to send messages.",
            NotificationKind::InvalidDraft => "Message not sent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.kind.title(), detail),
            None => f.write_str(self.kind.title()),
        }
    }
}

/// Fan-out of notifications to any number of listeners.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn emit(&self, kind: NotificationKind, detail: Option<String>) {
        let notification = Notification {
            kind,
            detail,
            at: Utc::now(),
        };
        tracing::warn!(kind = ?kind, detail = ?notification.detail, "{}", kind.title());

        if self.tx.send(notification).is_err() {
            tracing::debug!(kind = ?kind, "No notification listeners");
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}
