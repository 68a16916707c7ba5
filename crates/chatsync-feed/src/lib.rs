// Remote message feed: the subscribe/append seam to the remote store, plus an
// in-process store driven by a command channel.

pub mod error;
pub mod feed;
pub mod memory;

pub use error::FeedError;
pub use feed::{FeedEvent, FeedSubscription, MessageFeed, SubscriptionId};
pub use memory::{spawn_memory_feed, FeedConfig, FeedStats, MemoryFeed};
