//! One participant's view of one conversation.
//!
//! [`ChatSession`] is what a presentation layer holds. It owns the
//! synchronizer and the send pipeline, remembers the connectivity and
//! conversation it was last given, and re-activates the synchronizer whenever
//! either changes: the previous source is always torn down before the new one
//! is selected.

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tracing::info;

use chatsync_feed::MessageFeed;
use chatsync_shared::{Attachment, Author, ConversationId, Draft, Message};
use chatsync_store::MessageCache;

use crate::events::{Notification, Notifier};
use crate::send::{Clock, SendOutcome, SendPipeline, SystemClock};
use crate::sync::{ObserverHandle, Synchronizer};

struct Params {
    connected: bool,
    conversation: ConversationId,
    open: bool,
}

pub struct ChatSession {
    author: Author,
    notifier: Notifier,
    sync: Synchronizer,
    sender: SendPipeline,
    params: Mutex<Params>,
}

impl ChatSession {
    pub fn new(
        feed: Arc<dyn MessageFeed>,
        cache: Arc<dyn MessageCache>,
        author: Author,
    ) -> Self {
        Self::with_parts(
            feed,
            cache,
            author,
            Notifier::default(),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        feed: Arc<dyn MessageFeed>,
        cache: Arc<dyn MessageCache>,
        author: Author,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            author,
            sync: Synchronizer::new(feed.clone(), cache, notifier.clone()),
            sender: SendPipeline::with_clock(feed, notifier.clone(), clock),
            notifier,
            params: Mutex::new(Params {
                connected: false,
                conversation: ConversationId::default(),
                open: false,
            }),
        }
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Start showing `conversation`.
    pub async fn open(&self, conversation: ConversationId, connected: bool) {
        let mut params = self.params.lock().await;
        let changed = !params.open
            || params.connected != connected
            || params.conversation != conversation;

        params.connected = connected;
        params.conversation = conversation;
        params.open = true;

        if changed {
            self.sync.deactivate().await;
        }
        self.sync.activate(params.connected, &params.conversation).await;
    }

    /// Connectivity changed on the host side.
    pub async fn set_connectivity(&self, connected: bool) {
        let mut params = self.params.lock().await;
        if !params.open {
            params.connected = connected;
            return;
        }
        let conversation = params.conversation.clone();
        drop(params);

        info!(connected, "Connectivity changed");
        self.open(conversation, connected).await;
    }

    /// Switch to another conversation, keeping the current connectivity.
    pub async fn open_conversation(&self, conversation: ConversationId) {
        let connected = self.params.lock().await.connected;
        info!(conversation = %conversation, "Opening conversation");
        self.open(conversation, connected).await;
    }

    /// The consuming view is going away. Safe to call repeatedly.
    pub async fn close(&self) {
        let mut params = self.params.lock().await;
        params.open = false;
        self.sync.deactivate().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.params.lock().await.connected
    }

    pub async fn conversation(&self) -> ConversationId {
        self.params.lock().await.conversation.clone()
    }

    /// Whether the host should offer a composer at all. Sending is refused
    /// while offline, so the input toolbar is hidden then.
    pub async fn can_compose(&self) -> bool {
        self.is_connected().await
    }

    pub async fn send(&self, text: Option<String>, attachment: Attachment) -> SendOutcome {
        let (conversation, connected) = {
            let params = self.params.lock().await;
            (params.conversation.clone(), params.connected)
        };
        let draft = Draft {
            author: self.author.clone(),
            text,
            attachment,
        };
        self.sender.send(&conversation, draft, connected).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> SendOutcome {
        self.send(Some(text.into()), Attachment::None).await
    }

    pub fn messages(&self) -> Vec<Message> {
        self.sync.messages()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<Message>> {
        self.sync.watch()
    }

    pub fn on_messages_changed<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&[Message]) + Send + 'static,
    {
        self.sync.on_messages_changed(callback)
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }
}
