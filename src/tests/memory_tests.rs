use crate::model::MessageDraft;
use crate::store::{CreateMessage, Credential, MessageStore};
use crate::tests::helpers::*;
use crate::Error;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_cancelled_request_leaves_no_in_flight_count() {
    let store = create_test_store().await;
    store.set_latency(Duration::from_millis(100));

    let background = store.clone();
    let task = tokio::spawn(async move {
        let credential = Credential::new(ENTREPRENEUR_TOKEN);
        background.list_messages(Some(&credential), THREAD).await
    });
    sleep(Duration::from_millis(20)).await;
    assert_eq!(store.stats().in_flight(), 1);

    task.abort();
    let _ = task.await;
    assert_eq!(store.stats().in_flight(), 0);

    store.set_latency(Duration::ZERO);
    let credential = Credential::new(ENTREPRENEUR_TOKEN);
    store.list_messages(Some(&credential), THREAD).await.expect("list");
    assert_eq!(count(&store.stats().max_in_flight), 1);
}

#[tokio::test]
async fn test_injected_failure_releases_in_flight_count() {
    let store = create_test_store().await;
    store.fail_next(1);
    let credential = Credential::new(ENTREPRENEUR_TOKEN);

    let result = store.unread_count(Some(&credential), THREAD).await;
    assert!(matches!(result, Err(Error::Store { status: 500, .. })));
    assert_eq!(store.stats().in_flight(), 0);
    assert_eq!(store.unread_count(Some(&credential), THREAD).await.expect("unread"), 0);
}

#[tokio::test]
async fn test_retry_as_rejects_other_users_message() {
    let store = create_test_store().await;
    let inbound = seed_inbound(&store, "investor terms").await;

    let request = CreateMessage::from_draft(&MessageDraft::text("rewritten"), None);
    let result = store.retry_as(ENTREPRENEUR, THREAD, &inbound.id, &request).await;
    assert!(matches!(result, Err(Error::Unauthorized(_))));

    let stored = store.thread_messages(THREAD).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "investor terms");
}

#[tokio::test]
async fn test_retry_as_creates_message_that_never_arrived() {
    let store = create_test_store().await;

    let request = CreateMessage::from_draft(&MessageDraft::text("first try lost"), Some("key-lost".to_string()));
    let message = store
        .retry_as(ENTREPRENEUR, THREAD, "temp-key-lost", &request)
        .await
        .expect("retry");
    assert_eq!(message.client_key.as_deref(), Some("key-lost"));

    // A second retry updates the same record
    let again = store
        .retry_as(ENTREPRENEUR, THREAD, "temp-key-lost", &request)
        .await
        .expect("retry");
    assert_eq!(again.id, message.id);
    assert_eq!(store.thread_messages(THREAD).await.len(), 1);
}
