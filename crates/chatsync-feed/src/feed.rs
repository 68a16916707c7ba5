//! The subscription primitive of the remote store.
//!
//! A subscription delivers the full, ordered message list of a conversation
//! on first delivery and after every change. It is not a diff stream: each
//! [`FeedEvent::Snapshot`] supersedes the previous one.

use async_trait::async_trait;
use tokio::sync::mpsc;

use chatsync_shared::{ConversationId, Message, MessageId, NewMessage};

use crate::error::FeedError;

/// Something the remote store delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Complete current list, newest first.
    Snapshot(Vec<Message>),
    /// The store reported a fault. The subscription may keep delivering.
    Fault(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// A live subscription. Dropping it unsubscribes.
///
/// Unsubscribing stops further deliveries, but events already queued in the
/// channel can still be received.
pub struct FeedSubscription {
    id: SubscriptionId,
    events: mpsc::UnboundedReceiver<FeedEvent>,
    cancel: Option<CancelFn>,
}

impl FeedSubscription {
    pub fn new(
        id: SubscriptionId,
        events: mpsc::UnboundedReceiver<FeedEvent>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            events,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next delivery, `None` once the store has terminated the subscription.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Remote, append-mostly message store.
#[async_trait]
pub trait MessageFeed: Send + Sync {
    /// Subscribe to a conversation's messages ordered by `created_at`
    /// descending.
    async fn subscribe(&self, conversation: &ConversationId)
        -> Result<FeedSubscription, FeedError>;

    /// Durably append a message and return the id the store assigned.
    ///
    /// Callers must not attempt this while offline.
    async fn append(
        &self,
        conversation: &ConversationId,
        message: NewMessage,
    ) -> Result<MessageId, FeedError>;
}
