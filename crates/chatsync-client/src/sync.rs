//! The synchronizer: single source of truth for the message list the UI sees.
//!
//! While connected it holds exactly one feed subscription and replaces the
//! in-memory list wholesale with every snapshot, writing each one through to
//! the local cache. While disconnected it publishes whatever the cache holds.
//!
//! Source selection (activate, deactivate) is serialized by an async mutex.
//! Reconciliation runs outside it. Every activation gets a new generation
//! number, kept together with the pump's abort handle in a small synchronous
//! gate: teardown bumps the generation and aborts the pump without
//! waiting on it, and a pump only publishes while its generation is still
//! current, so a snapshot racing a teardown is dropped instead of leaking into
//! the new context.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::{watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use chatsync_feed::{FeedEvent, FeedSubscription, MessageFeed, SubscriptionId};
use chatsync_shared::{order_newest_first, ConversationId, Message};
use chatsync_store::MessageCache;

use crate::events::{NotificationKind, Notifier};

/// Where the published list currently comes from.
enum Source {
    Idle,
    /// Published once from the local cache.
    Cached { conversation: ConversationId },
    /// Driven by a live feed subscription.
    Live {
        conversation: ConversationId,
        subscription: SubscriptionId,
    },
    /// The feed terminated the subscription on its own.
    Ended { conversation: ConversationId },
}

impl Source {
    fn serves(&self, connected: bool, conversation: &ConversationId) -> bool {
        match self {
            Source::Live {
                conversation: c, ..
            } => connected && c == conversation,
            Source::Cached { conversation: c } => !connected && c == conversation,
            Source::Idle | Source::Ended { .. } => false,
        }
    }
}

/// Generation counter and the running pump. Only ever locked for a few
/// instructions, never across an await.
#[derive(Default)]
struct Gate {
    generation: u64,
    pump: Option<AbortHandle>,
}

struct Shared {
    cache: Arc<dyn MessageCache>,
    notifier: Notifier,
    list_tx: watch::Sender<Vec<Message>>,
    gate: StdMutex<Gate>,
    source: Mutex<Source>,
}

impl Shared {
    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.gate().generation == generation
    }

    /// Invalidate the running pump and abort it. Returns the new generation.
    fn teardown(&self) -> u64 {
        let mut gate = self.gate();
        gate.generation += 1;
        if let Some(pump) = gate.pump.take() {
            // Aborting drops the subscription, which unsubscribes.
            pump.abort();
        }
        gate.generation
    }

    /// Replace the published list with a snapshot and write it through.
    async fn reconcile(&self, generation: u64, mut list: Vec<Message>) {
        order_newest_first(&mut list);

        if let Err(e) = self.cache.save(&list).await {
            self.notifier
                .emit(NotificationKind::CacheWrite, Some(e.to_string()));
        }

        // Checked and published under the gate so a teardown cannot slip in
        // between.
        let gate = self.gate();
        if gate.generation != generation {
            debug!("Discarding snapshot reconciled after teardown");
            return;
        }
        debug!(count = list.len(), "Snapshot reconciled");
        self.list_tx.send_replace(list);
    }

    async fn publish_cached(&self) {
        let list = match self.cache.load().await {
            Ok(list) => list,
            Err(e) => {
                self.notifier
                    .emit(NotificationKind::CacheRead, Some(e.to_string()));
                Vec::new()
            }
        };

        debug!(count = list.len(), "Published cached messages");
        self.list_tx.send_replace(list);
    }
}

/// Keeps the published message list in sync with the feed or the cache.
pub struct Synchronizer {
    feed: Arc<dyn MessageFeed>,
    shared: Arc<Shared>,
}

impl Synchronizer {
    pub fn new(
        feed: Arc<dyn MessageFeed>,
        cache: Arc<dyn MessageCache>,
        notifier: Notifier,
    ) -> Self {
        let (list_tx, _) = watch::channel(Vec::new());
        Self {
            feed,
            shared: Arc::new(Shared {
                cache,
                notifier,
                list_tx,
                gate: StdMutex::new(Gate::default()),
                source: Mutex::new(Source::Idle),
            }),
        }
    }

    /// Select a source for `conversation` based on connectivity.
    ///
    /// Calling it again with the same parameters is a no-op. Different
    /// parameters tear down the previous source first. Failures never escape:
    /// a refused subscription is reported and the cached list is shown.
    pub async fn activate(&self, connected: bool, conversation: &ConversationId) {
        let mut source = self.shared.source.lock().await;

        if source.serves(connected, conversation) {
            debug!(connected, conversation = %conversation, "Already active");
            return;
        }

        let generation = self.stop(&mut source);

        if connected {
            match self.feed.subscribe(conversation).await {
                Ok(subscription) => {
                    let id = subscription.id();
                    let pump = tokio::spawn(run_pump(
                        self.shared.clone(),
                        subscription,
                        generation,
                        conversation.clone(),
                    ));
                    self.shared.gate().pump = Some(pump.abort_handle());
                    info!(subscription = %id, conversation = %conversation, "Live subscription started");
                    *source = Source::Live {
                        conversation: conversation.clone(),
                        subscription: id,
                    };
                    return;
                }
                Err(e) => {
                    self.shared
                        .notifier
                        .emit(NotificationKind::Subscription, Some(e.to_string()));
                }
            }
        }

        self.shared.publish_cached().await;
        info!(conversation = %conversation, "Serving cached messages");
        *source = Source::Cached {
            conversation: conversation.clone(),
        };
    }

    /// Tear down the active source, if any. Safe to call repeatedly.
    ///
    /// Never waits for a snapshot that is being reconciled: its pump is
    /// aborted and its result discarded.
    pub async fn deactivate(&self) {
        let mut source = self.shared.source.lock().await;
        self.stop(&mut source);
    }

    fn stop(&self, source: &mut Source) -> u64 {
        let generation = self.shared.teardown();
        if let Source::Live { subscription, .. } = std::mem::replace(source, Source::Idle) {
            info!(subscription = %subscription, "Live subscription stopped");
        }
        generation
    }

    /// Whether a live subscription currently drives the list.
    pub async fn is_live(&self) -> bool {
        matches!(*self.shared.source.lock().await, Source::Live { .. })
    }

    /// The currently published list, newest first.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.list_tx.borrow().clone()
    }

    /// Receiver that observes every published list.
    pub fn watch(&self) -> watch::Receiver<Vec<Message>> {
        self.shared.list_tx.subscribe()
    }

    /// Invoke `callback` with the current list and then with every newly
    /// published one. Intermediate lists may be skipped if the callback is
    /// slower than the feed; the latest list is always delivered.
    ///
    /// Dropping the returned handle stops the callbacks.
    pub fn on_messages_changed<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&[Message]) + Send + 'static,
    {
        let mut rx = self.watch();
        let task = tokio::spawn(async move {
            loop {
                let list = rx.borrow_and_update().clone();
                callback(&list);
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        ObserverHandle(task)
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

/// Stops an observer registered with [`Synchronizer::on_messages_changed`]
/// when dropped.
pub struct ObserverHandle(JoinHandle<()>);

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Drain one subscription into the shared state.
async fn run_pump(
    shared: Arc<Shared>,
    mut subscription: FeedSubscription,
    generation: u64,
    conversation: ConversationId,
) {
    while let Some(event) = subscription.next().await {
        if !shared.is_current(generation) {
            debug!(subscription = %subscription.id(), "Discarding delivery from stale subscription");
            return;
        }

        match event {
            FeedEvent::Snapshot(list) => shared.reconcile(generation, list).await,
            FeedEvent::Fault(reason) => {
                shared
                    .notifier
                    .emit(NotificationKind::Subscription, Some(reason));
            }
        }
    }

    let mut source = shared.source.lock().await;
    if shared.is_current(generation) {
        warn!(subscription = %subscription.id(), "Feed terminated the subscription");
        *source = Source::Ended { conversation };
    }
}
