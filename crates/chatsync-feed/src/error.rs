use chatsync_shared::ConversationId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Remote store unreachable")]
    Unreachable,

    #[error("Quota exceeded for {conversation}: {max} documents")]
    QuotaExceeded {
        conversation: ConversationId,
        max: usize,
    },

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Feed task is no longer running")]
    Closed,
}
