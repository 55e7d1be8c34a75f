use crate::chat::{ChatThread, PollConfig, Synchronizer};
use crate::model::MessageStatus;
use crate::store::Credential;
use crate::tests::helpers::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[test]
fn test_default_poll_config() {
    let config = PollConfig::default();
    assert_eq!(config.interval, Duration::from_millis(5000));
    assert!(config.enabled);
}

#[tokio::test]
async fn test_initial_fetch_is_immediate() {
    let store = create_test_store().await;
    seed_inbound(&store, "hello").await;
    let chat = create_test_chat(&store);

    // Interval far beyond the test duration: only the initial fetch can run
    let mut handle = Synchronizer::start(&chat, PollConfig::every(Duration::from_secs(60)));
    sleep(Duration::from_millis(100)).await;

    assert!(handle.is_running());
    assert_eq!(count(&store.stats().list_calls), 1);
    assert_eq!(count(&store.stats().unread_calls), 1);
    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 1);
    assert!(!state.loading);

    handle.stop();
    assert!(!handle.is_running());
}

#[tokio::test]
async fn test_polls_repeat_at_interval() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    let _handle = Synchronizer::start(&chat, PollConfig::every(Duration::from_millis(20)));
    sleep(Duration::from_millis(100)).await;
    assert!(count(&store.stats().list_calls) >= 3);

    // New inbound messages show up through the background poll
    seed_inbound(&store, "new offer").await;
    sleep(Duration::from_millis(100)).await;
    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].status, MessageStatus::Delivered);
}

#[tokio::test]
async fn test_poll_cycles_never_overlap() {
    let store = create_test_store().await;
    store.set_latency(Duration::from_millis(25));
    seed_inbound(&store, "hello").await;
    let chat = create_test_chat(&store);

    let _handle = Synchronizer::start(&chat, PollConfig::every(Duration::from_millis(5)));

    // Manual refreshes racing the loop are turned away while a cycle runs
    let mut skipped = 0;
    for _ in 0..10 {
        sleep(Duration::from_millis(15)).await;
        if !chat.refresh(true).await.expect("refresh") {
            skipped += 1;
        }
    }

    assert!(skipped > 0);
    assert_eq!(count(&store.stats().max_in_flight), 1);

    // Each cycle fetches messages before the unread count
    let lists = count(&store.stats().list_calls);
    let unread = count(&store.stats().unread_calls);
    assert!(lists == unread || lists == unread + 1);
}

#[tokio::test]
async fn test_no_updates_after_stop() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    let mut handle = Synchronizer::start(&chat, PollConfig::every(Duration::from_millis(20)));
    sleep(Duration::from_millis(70)).await;
    handle.stop();

    let revision = chat.snapshot().await.revision;
    let calls = count(&store.stats().list_calls);

    seed_inbound(&store, "after teardown").await;
    sleep(Duration::from_millis(150)).await;

    let state = chat.snapshot().await;
    assert_eq!(state.revision, revision);
    assert!(state.messages.is_empty());
    assert_eq!(count(&store.stats().list_calls), calls);
    assert!(!chat.is_fetching());
}

#[tokio::test]
async fn test_stop_discards_in_flight_cycle() {
    let store = create_test_store().await;
    store.set_latency(Duration::from_millis(100));
    seed_inbound(&store, "slow").await;
    let chat = create_test_chat(&store);

    let handle = Synchronizer::start(&chat, PollConfig::every(Duration::from_millis(20)));
    sleep(Duration::from_millis(30)).await;
    assert!(chat.is_fetching());

    // Dropping the handle tears the loop down
    drop(handle);
    assert!(!chat.is_fetching());
    let revision = chat.snapshot().await.revision;

    sleep(Duration::from_millis(250)).await;
    let state = chat.snapshot().await;
    assert_eq!(state.revision, revision);
    assert!(state.messages.is_empty());
}

#[tokio::test]
async fn test_stop_during_initial_fetch_clears_loading() {
    let store = create_test_store().await;
    store.set_latency(Duration::from_millis(100));
    let chat = create_test_chat(&store);

    let handle = Synchronizer::start(&chat, PollConfig::every(Duration::from_secs(60)));
    sleep(Duration::from_millis(30)).await;
    assert!(chat.snapshot().await.loading);

    drop(handle);
    assert!(!chat.snapshot().await.loading);

    sleep(Duration::from_millis(200)).await;
    let state = chat.snapshot().await;
    assert!(!state.loading);
    assert!(state.messages.is_empty());
}

#[tokio::test]
async fn test_manual_fetch_discarded_by_stop_clears_loading() {
    let store = create_test_store().await;
    store.set_latency(Duration::from_millis(100));
    seed_inbound(&store, "late").await;
    let chat = create_test_chat(&store);

    let manual = chat.clone();
    let task = tokio::spawn(async move { manual.refresh(false).await });
    sleep(Duration::from_millis(20)).await;

    // The loop's initial fetch is turned away by the manual one in flight
    let mut handle = Synchronizer::start(&chat, PollConfig::every(Duration::from_secs(60)));
    sleep(Duration::from_millis(10)).await;
    handle.stop();

    assert!(!task.await.expect("task panicked").expect("refresh"));
    let state = chat.snapshot().await;
    assert!(!state.loading);
    assert!(state.messages.is_empty());
}

#[tokio::test]
async fn test_errors_do_not_stop_polling() {
    let store = create_test_store().await;
    store.fail_next(4);
    seed_inbound(&store, "eventually").await;
    let chat = create_test_chat(&store);

    let _handle = Synchronizer::start(&chat, PollConfig::every(Duration::from_millis(20)));
    sleep(Duration::from_millis(60)).await;
    // Initial, non-silent fetch failed
    assert!(chat.snapshot().await.error.is_some());

    sleep(Duration::from_millis(150)).await;
    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 1);
    assert!(count(&store.stats().list_calls) >= 3);
}

#[tokio::test]
async fn test_disabled_polling_does_nothing() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    let handle = Synchronizer::start(
        &chat,
        PollConfig {
            interval: Duration::from_millis(10),
            enabled: false,
        },
    );
    sleep(Duration::from_millis(50)).await;

    assert!(!handle.is_running());
    assert_eq!(count(&store.stats().list_calls), 0);
}

#[tokio::test]
async fn test_empty_thread_id_does_nothing() {
    let store = create_test_store().await;
    let chat = ChatThread::new(
        Arc::new(store.clone()),
        "",
        ENTREPRENEUR,
        Some(Credential::new(ENTREPRENEUR_TOKEN)),
    );

    let handle = Synchronizer::start(&chat, PollConfig::every(Duration::from_millis(10)));
    sleep(Duration::from_millis(50)).await;

    assert!(!handle.is_running());
    assert_eq!(count(&store.stats().list_calls), 0);
}

#[tokio::test]
async fn test_missing_credential_keeps_loop_alive() {
    let store = create_test_store().await;
    let chat = ChatThread::new(Arc::new(store.clone()), THREAD, ENTREPRENEUR, None);

    let handle = Synchronizer::start(&chat, PollConfig::every(Duration::from_millis(20)));
    sleep(Duration::from_millis(100)).await;

    assert!(handle.is_running());
    assert!(count(&store.stats().list_calls) >= 2);
    let state = chat.snapshot().await;
    assert!(state.error.as_deref().is_some_and(|e| e.contains("Not authenticated")));
}
