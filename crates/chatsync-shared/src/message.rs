//! Message records and the ordering rule applied to message lists.
//!
//! A [`Message`] is immutable once the remote store has assigned its id. The
//! client composes a [`Draft`], stamps it into a [`NewMessage`] at send time,
//! and only ever sees the resulting [`Message`] again through a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{LATITUDE_RANGE, LONGITUDE_RANGE, MAX_ATTACHMENT_URI_LEN, MAX_TEXT_LEN};
use crate::error::DraftError;
use crate::types::{MessageId, UserId};

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// Optional payload carried next to (or instead of) the text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attachment {
    #[default]
    None,
    /// Reference to an uploaded image (storage URI).
    Image { uri: String },
    /// Reference to an uploaded audio clip (storage URI).
    Audio { uri: String },
    /// A shared geographic position.
    Location { latitude: f64, longitude: f64 },
}

impl Attachment {
    pub fn is_none(&self) -> bool {
        matches!(self, Attachment::None)
    }

    fn validate(&self) -> Result<(), DraftError> {
        match self {
            Attachment::None => Ok(()),
            Attachment::Image { uri } | Attachment::Audio { uri } => {
                if uri.trim().is_empty() || uri.len() > MAX_ATTACHMENT_URI_LEN {
                    Err(DraftError::InvalidAttachmentUri)
                } else {
                    Ok(())
                }
            }
            Attachment::Location {
                latitude,
                longitude,
            } => {
                let lat_ok = (LATITUDE_RANGE.0..=LATITUDE_RANGE.1).contains(latitude);
                let lon_ok = (LONGITUDE_RANGE.0..=LONGITUDE_RANGE.1).contains(longitude);
                if lat_ok && lon_ok {
                    Ok(())
                } else {
                    Err(DraftError::InvalidLocation {
                        latitude: *latitude,
                        longitude: *longitude,
                    })
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A message as known to the remote store (and mirrored in the local cache).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Identifier assigned by the remote store on append.
    pub id: MessageId,
    /// Sending participant.
    pub author_id: UserId,
    /// Display name captured at send time; never re-resolved.
    pub author_name: String,
    /// Plain text content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Client-stamped creation time, the sole ordering key.
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Attachment::is_none")]
    pub attachment: Attachment,
}

/// A stamped draft on its way to the remote store. Everything but the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMessage {
    pub author_id: UserId,
    pub author_name: String,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attachment: Attachment,
}

impl NewMessage {
    /// Materialize the stored message once the store has assigned an id.
    pub fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            author_id: self.author_id,
            author_name: self.author_name,
            text: self.text,
            created_at: self.created_at,
            attachment: self.attachment,
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// The sending participant as known to the host application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    pub name: String,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            name: name.into(),
        }
    }
}

/// A not-yet-durable outgoing message composed by the sender.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub author: Author,
    pub text: Option<String>,
    pub attachment: Attachment,
}

impl Draft {
    pub fn text(author: Author, text: impl Into<String>) -> Self {
        Self {
            author,
            text: Some(text.into()),
            attachment: Attachment::None,
        }
    }

    pub fn with_attachment(author: Author, attachment: Attachment) -> Self {
        Self {
            author,
            text: None,
            attachment,
        }
    }

    /// True when there is nothing to send: no non-blank text and no attachment.
    pub fn is_empty(&self) -> bool {
        let has_text = self
            .text
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
        !has_text && self.attachment.is_none()
    }

    pub fn validate(&self) -> Result<(), DraftError> {
        if self.author.id.is_empty() {
            return Err(DraftError::MissingAuthor);
        }
        if self.is_empty() {
            return Err(DraftError::Empty);
        }
        if let Some(text) = &self.text {
            let len = text.chars().count();
            if len > MAX_TEXT_LEN {
                return Err(DraftError::TextTooLong {
                    len,
                    max: MAX_TEXT_LEN,
                });
            }
        }
        self.attachment.validate()
    }

    /// Validate and stamp the draft with its creation time.
    ///
    /// Blank text is dropped so an attachment-only draft does not carry an
    /// empty string.
    pub fn stamp(self, created_at: DateTime<Utc>) -> Result<NewMessage, DraftError> {
        self.validate()?;
        let text = self.text.filter(|t| !t.trim().is_empty());
        Ok(NewMessage {
            author_id: self.author.id,
            author_name: self.author.name,
            text,
            created_at,
            attachment: self.attachment,
        })
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Sort a message list newest first.
///
/// The sort is stable: messages with equal `created_at` keep the order the
/// store delivered them in.
pub fn order_newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
