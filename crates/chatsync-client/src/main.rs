//! # chatsync
//!
//! Line-oriented demo host for the chatsync core. It plays the part of the
//! presentation layer: it renders every published list, prints notifications,
//! and lets the user flip connectivity by hand.
//!
//! The remote store is the in-process one, the cache is a SQLite file, so the
//! cached list survives restarts even though the remote one does not.
//!
//! Lines are sent as text messages. Commands:
//! - `/online`, `/offline`: change the connectivity signal
//! - `/open <conversation>`: switch conversation
//! - `/location <lat> <lon>`, `/image <uri>`, `/audio <uri>`: attachments
//! - `/fault <reason>`: make the store report a fault to subscribers
//! - `/unreachable`, `/reachable`: make the store refuse or accept work
//! - `/dump`: print the current list as JSON
//! - `/quit`

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use chatsync_client::{ChatSession, ClientConfig, Notifier, SendOutcome, SystemClock};
use chatsync_feed::{spawn_memory_feed, FeedConfig, MemoryFeed};
use chatsync_shared::{Attachment, ConversationId, Message};
use chatsync_store::{Database, SqliteCache};

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Text(String),
    Online,
    Offline,
    Open(ConversationId),
    Attach(Attachment),
    Fault(String),
    Reachable(bool),
    Dump,
    Quit,
    Nothing,
}

#[derive(Error, Debug, PartialEq)]
enum CommandError {
    #[error("Unknown command: /{0}")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Nothing);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Text(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (name, args.as_slice()) {
        ("online", []) => Ok(Command::Online),
        ("offline", []) => Ok(Command::Offline),
        ("open", [id]) => Ok(Command::Open(ConversationId::from(*id))),
        ("open", _) => Err(CommandError::Usage("/open <conversation>")),
        ("location", [lat, lon]) => match (lat.parse::<f64>(), lon.parse::<f64>()) {
            (Ok(latitude), Ok(longitude)) => Ok(Command::Attach(Attachment::Location {
                latitude,
                longitude,
            })),
            _ => Err(CommandError::Usage("/location <lat> <lon>")),
        },
        ("location", _) => Err(CommandError::Usage("/location <lat> <lon>")),
        ("image", [uri]) => Ok(Command::Attach(Attachment::Image {
            uri: uri.to_string(),
        })),
        ("image", _) => Err(CommandError::Usage("/image <uri>")),
        ("audio", [uri]) => Ok(Command::Attach(Attachment::Audio {
            uri: uri.to_string(),
        })),
        ("audio", _) => Err(CommandError::Usage("/audio <uri>")),
        ("fault", reason) if !reason.is_empty() => Ok(Command::Fault(reason.join(" "))),
        ("fault", _) => Err(CommandError::Usage("/fault <reason>")),
        ("unreachable", []) => Ok(Command::Reachable(false)),
        ("reachable", []) => Ok(Command::Reachable(true)),
        ("dump", []) => Ok(Command::Dump),
        ("quit", []) | ("exit", []) => Ok(Command::Quit),
        (other, _) => Err(CommandError::Unknown(other.to_string())),
    }
}

fn describe(message: &Message) -> String {
    let body = message.text.clone().unwrap_or_default();
    let extra = match &message.attachment {
        Attachment::None => String::new(),
        Attachment::Image { uri } => format!(" [image {uri}]"),
        Attachment::Audio { uri } => format!(" [audio {uri}]"),
        Attachment::Location {
            latitude,
            longitude,
        } => format!(" [location {latitude:.4},{longitude:.4}]"),
    };
    format!(
        "{} {}: {}{}",
        message.created_at.format("%H:%M:%S"),
        message.author_name,
        body,
        extra
    )
}

fn render(list: &[Message]) {
    println!("--- {} message(s) ---", list.len());
    // Newest first in memory, newest last on screen.
    for message in list.iter().rev() {
        println!("{}", describe(message));
    }
}

async fn run_command(session: &ChatSession, feed: &MemoryFeed, command: Command) {
    match command {
        Command::Text(text) => report(session.send_text(text).await),
        Command::Attach(attachment) => report(session.send(None, attachment).await),
        Command::Online => session.set_connectivity(true).await,
        Command::Offline => session.set_connectivity(false).await,
        Command::Open(conversation) => session.open_conversation(conversation).await,
        Command::Fault(reason) => {
            let conversation = session.conversation().await;
            if let Err(e) = feed.inject_fault(&conversation, reason).await {
                warn!(error = %e, "Could not inject fault");
            }
        }
        Command::Reachable(reachable) => {
            if let Err(e) = feed.set_reachable(reachable).await {
                warn!(error = %e, "Could not change reachability");
            }
        }
        Command::Dump => match serde_json::to_string_pretty(&session.messages()) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!(error = %e, "Could not encode messages"),
        },
        Command::Quit | Command::Nothing => {}
    }
}

fn report(outcome: SendOutcome) {
    if let SendOutcome::Sent(id) = outcome {
        println!("(sent as {id}, waiting for the feed)");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatsync_client::init_tracing();

    info!("Starting chatsync v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let cache = Arc::new(SqliteCache::new(db, config.cache_slot.clone()));

    let feed = spawn_memory_feed(FeedConfig {
        max_documents_per_conversation: config.feed_quota,
        ..FeedConfig::default()
    });

    let session = ChatSession::with_parts(
        Arc::new(feed.clone()),
        cache,
        config.author(),
        Notifier::new(config.notification_capacity),
        Arc::new(SystemClock),
    );

    let _observer = session.on_messages_changed(render);

    let mut notifications = session.notifications();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(n) => println!("! {n}"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notification listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    session
        .open(config.conversation.clone(), config.start_online)
        .await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => run_command(&session, &feed, command).await,
                    Err(e) => eprintln!("{e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    session.close().await;
    feed.shutdown().await;

    Ok(())
}
