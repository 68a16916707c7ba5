//! In-process message store with the tokio command pattern.
//!
//! The store runs in a dedicated tokio task that owns every document and
//! every subscriber. [`MemoryFeed`] handles talk to it through a typed command
//! channel, so appends and subscriptions are serialized in the order the task
//! receives them and snapshots reach each subscriber in that same order.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use chatsync_shared::{ConversationId, Message, MessageId, NewMessage};

use crate::error::FeedError;
use crate::feed::{FeedEvent, FeedSubscription, MessageFeed, SubscriptionId};

// ---------------------------------------------------------------------------
// Commands / configuration
// ---------------------------------------------------------------------------

/// Commands sent *into* the store task.
enum FeedCommand {
    Subscribe {
        conversation: ConversationId,
        reply: oneshot::Sender<Result<Subscribed, FeedError>>,
    },
    Unsubscribe(SubscriptionId),
    Append {
        conversation: ConversationId,
        message: NewMessage,
        reply: oneshot::Sender<Result<MessageId, FeedError>>,
    },
    SetReachable(bool),
    InjectFault {
        conversation: ConversationId,
        reason: String,
    },
    Documents {
        conversation: ConversationId,
        reply: oneshot::Sender<Vec<Message>>,
    },
    Stats {
        conversation: ConversationId,
        reply: oneshot::Sender<FeedStats>,
    },
    Shutdown,
}

struct Subscribed {
    id: SubscriptionId,
    events: mpsc::UnboundedReceiver<FeedEvent>,
}

/// Configuration for spawning the store task.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Maximum documents per conversation (0 = unlimited). Appends beyond it
    /// fail with [`FeedError::QuotaExceeded`].
    pub max_documents_per_conversation: usize,
    /// Capacity of the command channel.
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_documents_per_conversation: 0,
            channel_capacity: 256,
        }
    }
}

/// Counters for one conversation, mostly useful to tests and the demo host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Live subscriptions on the conversation.
    pub subscribers: usize,
    /// Documents stored in the conversation.
    pub documents: usize,
    /// Append attempts against the conversation, successful or not.
    pub append_attempts: u64,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable handle to a running in-process store.
#[derive(Clone)]
pub struct MemoryFeed {
    cmd_tx: mpsc::Sender<FeedCommand>,
}

/// Spawn the store in a background tokio task and return a handle to it.
///
/// Must be called from within a tokio runtime.
pub fn spawn_memory_feed(config: FeedConfig) -> MemoryFeed {
    let (cmd_tx, cmd_rx) = mpsc::channel::<FeedCommand>(config.channel_capacity.max(1));

    info!(
        quota = config.max_documents_per_conversation,
        "Spawning in-process message store"
    );

    tokio::spawn(run_store(config, cmd_rx));

    MemoryFeed { cmd_tx }
}

impl MemoryFeed {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> FeedCommand,
    ) -> Result<T, FeedError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| FeedError::Closed)?;
        reply_rx.await.map_err(|_| FeedError::Closed)
    }

    /// Simulate the store becoming (un)reachable. While unreachable, appends
    /// and new subscriptions fail with [`FeedError::Unreachable`].
    pub async fn set_reachable(&self, reachable: bool) -> Result<(), FeedError> {
        self.cmd_tx
            .send(FeedCommand::SetReachable(reachable))
            .await
            .map_err(|_| FeedError::Closed)
    }

    /// Report a fault to every subscriber of a conversation.
    pub async fn inject_fault(
        &self,
        conversation: &ConversationId,
        reason: impl Into<String>,
    ) -> Result<(), FeedError> {
        self.cmd_tx
            .send(FeedCommand::InjectFault {
                conversation: conversation.clone(),
                reason: reason.into(),
            })
            .await
            .map_err(|_| FeedError::Closed)
    }

    /// Current ordered documents of a conversation.
    pub async fn documents(&self, conversation: &ConversationId) -> Result<Vec<Message>, FeedError> {
        let conversation = conversation.clone();
        self.request(|reply| FeedCommand::Documents {
            conversation,
            reply,
        })
        .await
    }

    pub async fn stats(&self, conversation: &ConversationId) -> Result<FeedStats, FeedError> {
        let conversation = conversation.clone();
        self.request(|reply| FeedCommand::Stats {
            conversation,
            reply,
        })
        .await
    }

    /// Stop the store task. Subscriptions end once their queues drain.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(FeedCommand::Shutdown).await;
    }
}

#[async_trait]
impl MessageFeed for MemoryFeed {
    async fn subscribe(
        &self,
        conversation: &ConversationId,
    ) -> Result<FeedSubscription, FeedError> {
        let conversation = conversation.clone();
        let Subscribed { id, events } = self
            .request(|reply| FeedCommand::Subscribe {
                conversation,
                reply,
            })
            .await??;

        let cmd_tx = self.cmd_tx.clone();
        Ok(FeedSubscription::new(id, events, move || {
            // A full command queue is fine to ignore: the task drops the
            // subscriber on its next delivery once the receiver is gone.
            if cmd_tx.try_send(FeedCommand::Unsubscribe(id)).is_err() {
                debug!(subscription = %id, "Unsubscribe not queued, will be reaped lazily");
            }
        }))
    }

    async fn append(
        &self,
        conversation: &ConversationId,
        message: NewMessage,
    ) -> Result<MessageId, FeedError> {
        let conversation = conversation.clone();
        self.request(|reply| FeedCommand::Append {
            conversation,
            message,
            reply,
        })
        .await?
    }
}

// ---------------------------------------------------------------------------
// Store task
// ---------------------------------------------------------------------------

struct Subscriber {
    conversation: ConversationId,
    tx: mpsc::UnboundedSender<FeedEvent>,
}

#[derive(Default)]
struct Conversation {
    /// Documents in insertion order.
    documents: Vec<Message>,
    append_attempts: u64,
}

impl Conversation {
    /// Newest first; among equal timestamps the later insertion comes first.
    fn ordered(&self) -> Vec<Message> {
        let mut list: Vec<Message> = self.documents.iter().rev().cloned().collect();
        chatsync_shared::order_newest_first(&mut list);
        list
    }
}

struct Store {
    config: FeedConfig,
    reachable: bool,
    next_subscription: u64,
    conversations: HashMap<ConversationId, Conversation>,
    subscribers: HashMap<SubscriptionId, Subscriber>,
}

async fn run_store(config: FeedConfig, mut cmd_rx: mpsc::Receiver<FeedCommand>) {
    let mut store = Store {
        config,
        reachable: true,
        next_subscription: 1,
        conversations: HashMap::new(),
        subscribers: HashMap::new(),
    };

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            FeedCommand::Subscribe {
                conversation,
                reply,
            } => {
                let _ = reply.send(store.subscribe(conversation));
            }
            FeedCommand::Unsubscribe(id) => {
                if store.subscribers.remove(&id).is_some() {
                    debug!(subscription = %id, "Subscriber removed");
                }
            }
            FeedCommand::Append {
                conversation,
                message,
                reply,
            } => {
                let _ = reply.send(store.append(conversation, message));
            }
            FeedCommand::SetReachable(reachable) => {
                info!(reachable, "Store reachability changed");
                store.reachable = reachable;
            }
            FeedCommand::InjectFault {
                conversation,
                reason,
            } => {
                warn!(conversation = %conversation, reason = %reason, "Injecting feed fault");
                store.broadcast(&conversation, FeedEvent::Fault(reason));
            }
            FeedCommand::Documents {
                conversation,
                reply,
            } => {
                let documents = store
                    .conversations
                    .get(&conversation)
                    .map(Conversation::ordered)
                    .unwrap_or_default();
                let _ = reply.send(documents);
            }
            FeedCommand::Stats {
                conversation,
                reply,
            } => {
                let _ = reply.send(store.stats(&conversation));
            }
            FeedCommand::Shutdown => {
                info!("Store shutting down");
                break;
            }
        }
    }

    debug!(
        subscribers = store.subscribers.len(),
        "Store task ended"
    );
}

impl Store {
    fn subscribe(&mut self, conversation: ConversationId) -> Result<Subscribed, FeedError> {
        if !self.reachable {
            return Err(FeedError::Unreachable);
        }

        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;

        let (tx, events) = mpsc::unbounded_channel();
        let snapshot = self
            .conversations
            .get(&conversation)
            .map(Conversation::ordered)
            .unwrap_or_default();
        // The receiver is still in hand, so this cannot fail.
        let _ = tx.send(FeedEvent::Snapshot(snapshot));

        debug!(subscription = %id, conversation = %conversation, "Subscriber added");
        self.subscribers
            .insert(id, Subscriber { conversation, tx });

        Ok(Subscribed { id, events })
    }

    fn append(
        &mut self,
        conversation: ConversationId,
        message: NewMessage,
    ) -> Result<MessageId, FeedError> {
        let quota = self.config.max_documents_per_conversation;
        let reachable = self.reachable;
        let entry = self.conversations.entry(conversation.clone()).or_default();
        entry.append_attempts += 1;

        if !reachable {
            return Err(FeedError::Unreachable);
        }
        if message.author_id.is_empty() {
            return Err(FeedError::Rejected("message has no author".into()));
        }
        if quota > 0 && entry.documents.len() >= quota {
            return Err(FeedError::QuotaExceeded {
                conversation,
                max: quota,
            });
        }

        let id = MessageId::generate();
        entry.documents.push(message.into_message(id.clone()));
        debug!(conversation = %conversation, id = %id, "Document appended");

        let snapshot = entry.ordered();
        self.broadcast(&conversation, FeedEvent::Snapshot(snapshot));

        Ok(id)
    }

    /// Deliver an event to every subscriber of a conversation, reaping those
    /// whose receiver is gone.
    fn broadcast(&mut self, conversation: &ConversationId, event: FeedEvent) {
        self.subscribers.retain(|id, sub| {
            if &sub.conversation != conversation {
                return true;
            }
            match sub.tx.send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(subscription = %id, "Subscriber gone, reaping");
                    false
                }
            }
        });
    }

    fn stats(&self, conversation: &ConversationId) -> FeedStats {
        let (documents, append_attempts) = self
            .conversations
            .get(conversation)
            .map(|c| (c.documents.len(), c.append_attempts))
            .unwrap_or((0, 0));
        FeedStats {
            subscribers: self
                .subscribers
                .values()
                .filter(|s| &s.conversation == conversation)
                .count(),
            documents,
            append_attempts,
        }
    }
}
