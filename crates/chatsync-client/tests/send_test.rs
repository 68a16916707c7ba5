mod common;

use std::sync::Arc;
use std::time::Duration;

use chatsync_client::{
    ChatSession, NotificationKind, Notifier, SendOutcome, SendPipeline, Synchronizer,
};
use chatsync_feed::{FeedError, FeedEvent};
use chatsync_shared::{Attachment, Author, ConversationId, Draft, DraftError, MessageId};
use chatsync_store::MemoryCache;

use common::*;

fn ada() -> Author {
    Author::new("u1", "Ada")
}

fn pipeline(feed: &ManualFeed, notifier: &Notifier, secs: i64) -> SendPipeline {
    SendPipeline::with_clock(
        Arc::new(feed.clone()),
        notifier.clone(),
        Arc::new(FixedClock(at(secs))),
    )
}

#[tokio::test]
async fn offline_send_never_reaches_the_store() {
    let feed = ManualFeed::new();
    let notifier = Notifier::default();
    let mut notifications = notifier.subscribe();
    let sender = pipeline(&feed, &notifier, 1);
    let conv = ConversationId::default();

    let drafts = vec![
        Draft::text(ada(), "hello"),
        Draft::with_attachment(
            ada(),
            Attachment::Location {
                latitude: 48.85,
                longitude: 2.35,
            },
        ),
        // Offline wins over validation.
        Draft::text(ada(), ""),
    ];

    for draft in drafts {
        assert_eq!(sender.send(&conv, draft, false).await, SendOutcome::Offline);
        assert_eq!(drain_kinds(&mut notifications), vec![NotificationKind::Offline]);
    }
    assert!(feed.appends().is_empty());
}

#[tokio::test]
async fn draft_is_stamped_with_clock_and_author() {
    let feed = ManualFeed::new();
    let notifier = Notifier::default();
    let sender = pipeline(&feed, &notifier, 42);
    let conv = ConversationId::from("room");

    let outcome = sender
        .send(&conv, Draft::text(ada(), "hello"), true)
        .await;
    assert_eq!(outcome, SendOutcome::Sent(MessageId::from("m1")));

    let appends = feed.appends();
    assert_eq!(appends.len(), 1);
    let (target, message) = &appends[0];
    assert_eq!(target, &conv);
    assert_eq!(message.author_id.as_str(), "u1");
    assert_eq!(message.author_name, "Ada");
    assert_eq!(message.text.as_deref(), Some("hello"));
    assert_eq!(message.created_at, at(42));
    assert!(message.attachment.is_none());
}

#[tokio::test]
async fn attachment_only_draft_carries_no_text() {
    let feed = ManualFeed::new();
    let notifier = Notifier::default();
    let sender = pipeline(&feed, &notifier, 1);
    let image = Attachment::Image {
        uri: "gs://bucket/cat.jpg".into(),
    };

    let draft = Draft {
        author: ada(),
        text: Some("  ".into()),
        attachment: image.clone(),
    };
    assert!(sender
        .send(&ConversationId::default(), draft, true)
        .await
        .is_sent());

    let (_, message) = &feed.appends()[0];
    assert_eq!(message.text, None);
    assert_eq!(message.attachment, image);
}

#[tokio::test]
async fn empty_draft_is_rejected_without_append() {
    let feed = ManualFeed::new();
    let notifier = Notifier::default();
    let mut notifications = notifier.subscribe();
    let sender = pipeline(&feed, &notifier, 1);

    let outcome = sender
        .send(&ConversationId::default(), Draft::text(ada(), "   "), true)
        .await;

    assert_eq!(outcome, SendOutcome::Rejected(DraftError::Empty));
    assert_eq!(drain_kinds(&mut notifications), vec![NotificationKind::InvalidDraft]);
    assert!(feed.appends().is_empty());
}

#[tokio::test]
async fn out_of_range_location_is_rejected() {
    let feed = ManualFeed::new();
    let notifier = Notifier::default();
    let sender = pipeline(&feed, &notifier, 1);

    let draft = Draft::with_attachment(
        ada(),
        Attachment::Location {
            latitude: 123.0,
            longitude: 0.0,
        },
    );
    let outcome = sender.send(&ConversationId::default(), draft, true).await;

    assert!(matches!(
        outcome,
        SendOutcome::Rejected(DraftError::InvalidLocation { .. })
    ));
    assert!(feed.appends().is_empty());
}

#[tokio::test]
async fn failed_append_is_reported_once_and_not_retried() {
    let feed = ManualFeed::new();
    feed.fail_appends_with(FeedError::Unreachable);
    let notifier = Notifier::default();
    let mut notifications = notifier.subscribe();
    let sender = pipeline(&feed, &notifier, 1);

    let outcome = sender
        .send(&ConversationId::default(), Draft::text(ada(), "hello"), true)
        .await;

    assert_eq!(outcome, SendOutcome::Failed(FeedError::Unreachable));
    let n = next_notification(&mut notifications).await;
    assert_eq!(n.kind, NotificationKind::RemoteWrite);
    assert_eq!(n.detail.as_deref(), Some(FeedError::Unreachable.to_string().as_str()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(feed.appends().len(), 1);
    assert!(drain_kinds(&mut notifications).is_empty());
}

#[tokio::test]
async fn failed_append_leaves_list_untouched() {
    let feed = ManualFeed::new();
    let notifier = Notifier::default();
    let sync = Synchronizer::new(
        Arc::new(feed.clone()),
        Arc::new(MemoryCache::new()),
        notifier.clone(),
    );
    let sender = pipeline(&feed, &notifier, 5);
    let conv = ConversationId::default();
    let mut rx = sync.watch();

    sync.activate(true, &conv).await;
    feed.emit(FeedEvent::Snapshot(vec![msg("1", "hi", 1)]));
    wait_for_list(&mut rx, |l| l.len() == 1).await;

    feed.fail_appends_with(FeedError::Rejected("permission denied".into()));
    assert!(!sender
        .send(&conv, Draft::text(ada(), "lost"), true)
        .await
        .is_sent());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ids(&sync.messages()), vec!["1"]);
}

#[tokio::test]
async fn offline_session_drops_drafts() {
    let feed = ManualFeed::new();
    let cache = Arc::new(MemoryCache::new());
    let session = ChatSession::new(Arc::new(feed.clone()), cache, ada());
    let mut notifications = session.notifications();

    session.open(ConversationId::default(), false).await;
    assert!(!session.can_compose().await);

    assert_eq!(session.send_text("hello").await, SendOutcome::Offline);
    assert_eq!(drain_kinds(&mut notifications), vec![NotificationKind::Offline]);
    assert!(feed.appends().is_empty());
    assert_eq!(feed.subscriptions_opened(), 0);
}

#[tokio::test]
async fn sent_message_appears_only_through_the_feed() {
    let feed = ManualFeed::new();
    let session = ChatSession::with_parts(
        Arc::new(feed.clone()),
        Arc::new(MemoryCache::new()),
        ada(),
        Notifier::default(),
        Arc::new(FixedClock(at(2))),
    );
    let mut rx = session.watch();

    session.open(ConversationId::default(), true).await;
    feed.emit(FeedEvent::Snapshot(vec![msg("1", "hi", 1)]));
    wait_for_list(&mut rx, |l| l.len() == 1).await;

    feed.queue_append_id("2");
    assert_eq!(
        session.send_text("yo").await,
        SendOutcome::Sent(MessageId::from("2"))
    );

    // No optimistic insert.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ids(&session.messages()), vec!["1"]);

    let (_, appended) = feed.appends().remove(0);
    let echoed = appended.into_message(MessageId::from("2"));
    feed.emit(FeedEvent::Snapshot(vec![echoed, msg("1", "hi", 1)]));

    let list = wait_for_list(&mut rx, |l| l.len() == 2).await;
    assert_eq!(ids(&list), vec!["2", "1"]);
    assert_eq!(list[0].text.as_deref(), Some("yo"));
    assert_eq!(list[0].author_name, "Ada");
}
