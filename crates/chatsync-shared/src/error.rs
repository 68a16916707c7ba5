use thiserror::Error;

/// Reasons a draft cannot be turned into an outgoing message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DraftError {
    #[error("Draft has no text and no attachment")]
    Empty,

    #[error("Text too long: {len} characters (max {max})")]
    TextTooLong { len: usize, max: usize },

    #[error("Attachment reference is empty or too long")]
    InvalidAttachmentUri,

    #[error("Location out of range: latitude {latitude}, longitude {longitude}")]
    InvalidLocation { latitude: f64, longitude: f64 },

    #[error("Author id is empty")]
    MissingAuthor,
}
