//! Outgoing messages.
//!
//! Sending is fail-fast: while offline nothing touches the network and the
//! draft is dropped, there is no outbox. Online, the draft is stamped with the
//! client clock and appended to the feed once. A successful append does not
//! touch the published list; the message shows up with the next snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use chatsync_feed::{FeedError, MessageFeed};
use chatsync_shared::{ConversationId, Draft, DraftError, MessageId};

use crate::events::{NotificationKind, Notifier};

/// Source of `created_at` stamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the sending device.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Durably appended under this id.
    Sent(MessageId),
    /// Not attempted: disconnected.
    Offline,
    /// Not attempted: the draft was empty or invalid.
    Rejected(DraftError),
    /// The append failed. The draft is not retried or kept.
    Failed(FeedError),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent(_))
    }
}

pub struct SendPipeline {
    feed: Arc<dyn MessageFeed>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl SendPipeline {
    pub fn new(feed: Arc<dyn MessageFeed>, notifier: Notifier) -> Self {
        Self::with_clock(feed, notifier, Arc::new(SystemClock))
    }

    pub fn with_clock(
        feed: Arc<dyn MessageFeed>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feed,
            notifier,
            clock,
        }
    }

    pub async fn send(
        &self,
        conversation: &ConversationId,
        draft: Draft,
        connected: bool,
    ) -> SendOutcome {
        if !connected {
            debug!(conversation = %conversation, "Dropping draft composed offline");
            self.notifier.emit(NotificationKind::Offline, None);
            return SendOutcome::Offline;
        }

        let message = match draft.stamp(self.clock.now()) {
            Ok(message) => message,
            Err(e) => {
                self.notifier
                    .emit(NotificationKind::InvalidDraft, Some(e.to_string()));
                return SendOutcome::Rejected(e);
            }
        };

        match self.feed.append(conversation, message).await {
            Ok(id) => {
                info!(id = %id, conversation = %conversation, "Message sent");
                SendOutcome::Sent(id)
            }
            Err(e) => {
                self.notifier
                    .emit(NotificationKind::RemoteWrite, Some(e.to_string()));
                SendOutcome::Failed(e)
            }
        }
    }
}
