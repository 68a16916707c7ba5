//! Read/write helpers for named cache slots.
//!
//! A slot stores its payload as a JSON envelope:
//!
//! ```json
//! { "version": 1, "messages": [ ... ] }
//! ```
//!
//! Decoding is fail-open: anything unreadable yields an empty list.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use chatsync_shared::Message;

use crate::database::Database;
use crate::error::Result;

/// Payload format version written by this build.
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    messages: Vec<Message>,
}

impl Database {
    /// Overwrite (or create) a slot. The write is a single statement inside a
    /// transaction, so readers see either the old or the new payload.
    pub fn write_slot(&self, name: &str, payload: &str) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO cache_slots (name, payload, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![name, payload, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Raw payload of a slot, `None` if it was never written.
    pub fn read_slot(&self, name: &str) -> Result<Option<String>> {
        let payload = self
            .conn()
            .query_row(
                "SELECT payload FROM cache_slots WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

}

/// Encode a message list into a slot payload.
pub fn encode_payload(messages: &[Message]) -> Result<String> {
    let envelope = EnvelopeRef {
        version: PAYLOAD_VERSION,
        messages,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode a slot payload. Empty, malformed or future-version payloads decode
/// to an empty list.
pub fn decode_payload(payload: &str) -> Vec<Message> {
    if payload.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Envelope>(payload) {
        Ok(envelope) if envelope.version <= PAYLOAD_VERSION => envelope.messages,
        Ok(envelope) => {
            tracing::warn!(
                found = envelope.version,
                supported = PAYLOAD_VERSION,
                "cached payload is from a newer version, ignoring"
            );
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "cached payload is unreadable, ignoring");
            Vec::new()
        }
    }
}
