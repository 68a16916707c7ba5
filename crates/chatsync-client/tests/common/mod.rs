#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{broadcast, mpsc, watch};

use chatsync_client::{Clock, Notification, NotificationKind};
use chatsync_feed::{FeedError, FeedEvent, FeedSubscription, MessageFeed, SubscriptionId};
use chatsync_shared::{Attachment, ConversationId, Message, MessageId, NewMessage, UserId};
use chatsync_store::{MemoryCache, MessageCache, StoreError};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn msg(id: &str, text: &str, secs: i64) -> Message {
    Message {
        id: MessageId::from(id),
        author_id: UserId::from("u1"),
        author_name: "Ada".into(),
        text: Some(text.into()),
        created_at: at(secs),
        attachment: Attachment::None,
    }
}

pub fn ids(list: &[Message]) -> Vec<String> {
    list.iter().map(|m| m.id.to_string()).collect()
}

/// Wait until the watched list satisfies `pred`, returning it.
pub async fn wait_for_list(
    rx: &mut watch::Receiver<Vec<Message>>,
    pred: impl Fn(&[Message]) -> bool,
) -> Vec<Message> {
    tokio::time::timeout(WAIT, async {
        loop {
            {
                let list = rx.borrow_and_update();
                if pred(&list) {
                    return list.clone();
                }
            }
            rx.changed().await.expect("synchronizer dropped");
        }
    })
    .await
    .expect("list never reached the expected state")
}

/// Poll a condition until it holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

pub async fn next_notification(rx: &mut broadcast::Receiver<Notification>) -> Notification {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("no notification")
        .expect("notification channel closed")
}

/// Drain whatever notifications are already queued.
pub fn drain_kinds(rx: &mut broadcast::Receiver<Notification>) -> Vec<NotificationKind> {
    let mut kinds = Vec::new();
    while let Ok(n) = rx.try_recv() {
        kinds.push(n.kind);
    }
    kinds
}

// ---------------------------------------------------------------------------
// ManualFeed
// ---------------------------------------------------------------------------

struct Sub {
    id: SubscriptionId,
    conversation: ConversationId,
    tx: Option<mpsc::UnboundedSender<FeedEvent>>,
    cancelled: bool,
}

#[derive(Default)]
struct Inner {
    next_sub: u64,
    subs: Vec<Sub>,
    appends: Vec<(ConversationId, NewMessage)>,
    append_ids: VecDeque<MessageId>,
    append_error: Option<FeedError>,
    subscribe_error: Option<FeedError>,
}

/// Feed whose deliveries are driven by the test.
#[derive(Clone, Default)]
pub struct ManualFeed {
    inner: Arc<Mutex<Inner>>,
}

impl ManualFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver to every subscription that has not been cancelled.
    pub fn emit(&self, event: FeedEvent) {
        let inner = self.inner.lock().unwrap();
        for sub in inner.subs.iter().filter(|s| !s.cancelled) {
            if let Some(tx) = &sub.tx {
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Deliver to one subscription even if it was cancelled, like a callback
    /// already in flight when the unsubscribe happened.
    pub fn emit_to(&self, id: SubscriptionId, event: FeedEvent) {
        let inner = self.inner.lock().unwrap();
        if let Some(tx) = inner
            .subs
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.tx.as_ref())
        {
            let _ = tx.send(event);
        }
    }

    /// Terminate every subscription from the store side.
    pub fn close_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        for sub in inner.subs.iter_mut() {
            sub.tx = None;
        }
    }

    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.inner.lock().unwrap().subs.iter().map(|s| s.id).collect()
    }

    pub fn conversations(&self) -> Vec<ConversationId> {
        self.inner
            .lock()
            .unwrap()
            .subs
            .iter()
            .map(|s| s.conversation.clone())
            .collect()
    }

    pub fn subscriptions_opened(&self) -> usize {
        self.inner.lock().unwrap().subs.len()
    }

    pub fn live_subscriptions(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .subs
            .iter()
            .filter(|s| !s.cancelled)
            .count()
    }

    pub fn appends(&self) -> Vec<(ConversationId, NewMessage)> {
        self.inner.lock().unwrap().appends.clone()
    }

    pub fn queue_append_id(&self, id: &str) {
        self.inner
            .lock()
            .unwrap()
            .append_ids
            .push_back(MessageId::from(id));
    }

    pub fn fail_appends_with(&self, error: FeedError) {
        self.inner.lock().unwrap().append_error = Some(error);
    }

    pub fn fail_subscribe_with(&self, error: Option<FeedError>) {
        self.inner.lock().unwrap().subscribe_error = error;
    }
}

#[async_trait]
impl MessageFeed for ManualFeed {
    async fn subscribe(
        &self,
        conversation: &ConversationId,
    ) -> Result<FeedSubscription, FeedError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = inner.subscribe_error.clone() {
            return Err(e);
        }

        inner.next_sub += 1;
        let id = SubscriptionId(inner.next_sub);
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subs.push(Sub {
            id,
            conversation: conversation.clone(),
            tx: Some(tx),
            cancelled: false,
        });

        let shared = self.inner.clone();
        Ok(FeedSubscription::new(id, rx, move || {
            let mut inner = shared.lock().unwrap();
            if let Some(sub) = inner.subs.iter_mut().find(|s| s.id == id) {
                sub.cancelled = true;
            }
        }))
    }

    async fn append(
        &self,
        conversation: &ConversationId,
        message: NewMessage,
    ) -> Result<MessageId, FeedError> {
        let mut inner = self.inner.lock().unwrap();
        inner.appends.push((conversation.clone(), message));
        if let Some(e) = inner.append_error.clone() {
            return Err(e);
        }
        let n = inner.appends.len();
        Ok(inner
            .append_ids
            .pop_front()
            .unwrap_or_else(|| MessageId(format!("m{n}"))))
    }
}

// ---------------------------------------------------------------------------
// Caches and clocks
// ---------------------------------------------------------------------------

/// Cache whose every call fails below the payload level.
#[derive(Default)]
pub struct BrokenCache;

#[async_trait]
impl MessageCache for BrokenCache {
    async fn save(&self, _messages: &[Message]) -> Result<(), StoreError> {
        Err(StoreError::Task("disk unavailable".into()))
    }

    async fn load(&self) -> Result<Vec<Message>, StoreError> {
        Err(StoreError::Task("disk unavailable".into()))
    }
}

/// In-memory cache whose saves take `delay` to complete.
pub struct SlowCache {
    pub delay: Duration,
    inner: MemoryCache,
}

impl SlowCache {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: MemoryCache::new(),
        }
    }
}

#[async_trait]
impl MessageCache for SlowCache {
    async fn save(&self, messages: &[Message]) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.save(messages).await
    }

    async fn load(&self) -> Result<Vec<Message>, StoreError> {
        self.inner.load().await
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
