/// Application name
pub const APP_NAME: &str = "chatsync";

/// Name of the remote collection (and default conversation) messages live in
pub const DEFAULT_CONVERSATION: &str = "messages";

/// Name of the local cache slot holding the last known message list
pub const DEFAULT_CACHE_SLOT: &str = "messages";

/// Maximum number of characters in a message's text
pub const MAX_TEXT_LEN: usize = 4_096;

/// Maximum length of an attachment reference (URI)
pub const MAX_ATTACHMENT_URI_LEN: usize = 2_048;

/// Valid latitude range in degrees
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);

/// Valid longitude range in degrees
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);
