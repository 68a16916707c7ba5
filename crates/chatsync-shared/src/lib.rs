//! Data model shared by every chatsync crate: messages, drafts, identifiers
//! and the ordering rule for message lists.

pub mod constants;
pub mod error;
pub mod message;
pub mod types;

pub use error::DraftError;
pub use message::{order_newest_first, Attachment, Author, Draft, Message, NewMessage};
pub use types::{ConversationId, MessageId, UserId};
