//! The [`MessageCache`] seam and its implementations.
//!
//! `load` fails open: a missing, empty or corrupt slot yields `Ok(vec![])`.
//! Only faults below the payload (SQLite, I/O, a dead worker) come back as
//! `Err`, and callers are expected to treat those as "nothing cached" too.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use chatsync_shared::Message;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::slots::{decode_payload, encode_payload};

/// Durable storage of exactly one named message list.
#[async_trait]
pub trait MessageCache: Send + Sync {
    /// Overwrite the stored list.
    async fn save(&self, messages: &[Message]) -> Result<()>;

    /// The last saved list, or an empty list if none is readable.
    async fn load(&self) -> Result<Vec<Message>>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// A cache slot inside a SQLite [`Database`].
///
/// Calls run on tokio's blocking pool so the async caller never waits on disk.
#[derive(Clone)]
pub struct SqliteCache {
    db: Arc<Mutex<Database>>,
    slot: String,
}

impl SqliteCache {
    pub fn new(db: Database, slot: impl Into<String>) -> Self {
        Self::shared(Arc::new(Mutex::new(db)), slot)
    }

    /// Use a database handle shared with other slots.
    pub fn shared(db: Arc<Mutex<Database>>, slot: impl Into<String>) -> Self {
        Self {
            db,
            slot: slot.into(),
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &str) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        let slot = self.slot.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&*guard, &slot)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl MessageCache for SqliteCache {
    async fn save(&self, messages: &[Message]) -> Result<()> {
        let payload = encode_payload(messages)?;
        let count = messages.len();
        self.with_db(move |db, slot| db.write_slot(slot, &payload))
            .await?;
        debug!(slot = %self.slot, count, "cache slot written");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Message>> {
        let payload = self.with_db(|db, slot| db.read_slot(slot)).await?;
        let messages = payload.as_deref().map(decode_payload).unwrap_or_default();
        debug!(slot = %self.slot, count = messages.len(), "cache slot read");
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local cache with the same encoding and fail-open rules as
/// [`SqliteCache`]. Used for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryCache {
    payload: Mutex<Option<String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a raw payload, e.g. one left behind by an older build.
    pub fn with_raw(payload: impl Into<String>) -> Self {
        Self {
            payload: Mutex::new(Some(payload.into())),
        }
    }

    /// The raw stored payload, if anything was saved.
    pub fn raw(&self) -> Option<String> {
        self.payload.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl MessageCache for MemoryCache {
    async fn save(&self, messages: &[Message]) -> Result<()> {
        let payload = encode_payload(messages)?;
        let mut guard = self.payload.lock().map_err(|_| StoreError::LockPoisoned)?;
        *guard = Some(payload);
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Message>> {
        let guard = self.payload.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(guard.as_deref().map(decode_payload).unwrap_or_default())
    }
}
