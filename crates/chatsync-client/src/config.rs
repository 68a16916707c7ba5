//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the demo host starts with zero
//! configuration.

use std::path::PathBuf;

use chatsync_shared::constants::{DEFAULT_CACHE_SLOT, DEFAULT_CONVERSATION};
use chatsync_shared::{Author, ConversationId};

use crate::events::DEFAULT_NOTIFICATION_CAPACITY;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SQLite file holding the local cache.
    /// Env: `CHATSYNC_DB_PATH`
    /// Default: platform data directory (`None`).
    pub db_path: Option<PathBuf>,

    /// Name of the cache slot.
    /// Env: `CHATSYNC_CACHE_SLOT`
    /// Default: `messages`
    pub cache_slot: String,

    /// Conversation opened at start.
    /// Env: `CHATSYNC_CONVERSATION`
    /// Default: `messages`
    pub conversation: ConversationId,

    /// Id of the local participant.
    /// Env: `CHATSYNC_USER_ID`
    pub user_id: String,

    /// Display name stamped on outgoing messages.
    /// Env: `CHATSYNC_USER_NAME`
    pub user_name: String,

    /// Initial connectivity.
    /// Env: `CHATSYNC_START_ONLINE` (true/false)
    /// Default: `true`
    pub start_online: bool,

    /// Per-conversation document quota of the in-process store (0 = unlimited).
    /// Env: `CHATSYNC_FEED_QUOTA`
    /// Default: `0`
    pub feed_quota: usize,

    /// Capacity of the notification channel.
    pub notification_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            cache_slot: DEFAULT_CACHE_SLOT.to_string(),
            conversation: ConversationId::new(DEFAULT_CONVERSATION),
            user_id: "local-user".to_string(),
            user_name: "Me".to_string(),
            start_online: true,
            feed_quota: 0,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("CHATSYNC_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(slot) = lookup("CHATSYNC_CACHE_SLOT") {
            if slot.trim().is_empty() {
                tracing::warn!("Empty CHATSYNC_CACHE_SLOT, using default");
            } else {
                config.cache_slot = slot;
            }
        }

        if let Some(conversation) = lookup("CHATSYNC_CONVERSATION") {
            if !conversation.trim().is_empty() {
                config.conversation = ConversationId::new(conversation);
            }
        }

        if let Some(id) = lookup("CHATSYNC_USER_ID") {
            if !id.trim().is_empty() {
                config.user_id = id;
            }
        }

        if let Some(name) = lookup("CHATSYNC_USER_NAME") {
            config.user_name = name;
        }

        if let Some(val) = lookup("CHATSYNC_START_ONLINE") {
            config.start_online = val != "false" && val != "0";
        }

        if let Some(val) = lookup("CHATSYNC_FEED_QUOTA") {
            match val.parse::<usize>() {
                Ok(n) => config.feed_quota = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid CHATSYNC_FEED_QUOTA, using default");
                }
            }
        }

        config
    }

    pub fn author(&self) -> Author {
        Author::new(self.user_id.clone(), self.user_name.clone())
    }
}
