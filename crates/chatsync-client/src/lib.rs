//! # chatsync-client
//!
//! Client-side synchronization of a conversation's message list with a remote
//! store. The presentation layer holds a [`ChatSession`], feeds it the host's
//! connectivity signal, renders whatever list it publishes and shows the
//! notifications it emits.

pub mod config;
pub mod events;
pub mod send;
pub mod session;
pub mod sync;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use events::{Notification, NotificationKind, Notifier};
pub use send::{Clock, SendOutcome, SendPipeline, SystemClock};
pub use session::ChatSession;
pub use sync::{ObserverHandle, Synchronizer};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("chatsync=debug,chatsync_client=debug,chatsync_feed=info,chatsync_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
