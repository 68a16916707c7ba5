//! # chatsync-store
//!
//! Local cache for the chatsync client: the last known message list of a
//! conversation, kept in a single named slot so it survives process restarts
//! and can be shown while the remote store is unreachable.
//!
//! The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection`, and the async [`MessageCache`] seam the
//! synchronizer talks to, with a SQLite-backed and an in-memory
//! implementation.

pub mod cache;
pub mod database;
pub mod migrations;
pub mod slots;

mod error;

pub use cache::{MemoryCache, MessageCache, SqliteCache};
pub use database::Database;
pub use error::StoreError;
