use crate::chat::ChatThread;
use crate::model::{Message, MessageDraft, MessageStatus, ProposalData};
use crate::store::{CreateMessage, Credential, MemoryStore, MessageStore};
use crate::tests::helpers::*;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Store whose delivery acknowledgements always fail
struct FailingDelivery(MemoryStore);

impl MessageStore for FailingDelivery {
    async fn list_messages(&self, credential: Option<&Credential>, thread_id: &str) -> Result<Vec<Message>> {
        self.0.list_messages(credential, thread_id).await
    }

    async fn unread_count(&self, credential: Option<&Credential>, thread_id: &str) -> Result<u64> {
        self.0.unread_count(credential, thread_id).await
    }

    async fn create_message(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        request: &CreateMessage,
    ) -> Result<Message> {
        self.0.create_message(credential, thread_id, request).await
    }

    async fn retry_message(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        message_id: &str,
        request: &CreateMessage,
    ) -> Result<Message> {
        self.0.retry_message(credential, thread_id, message_id, request).await
    }

    async fn mark_delivered(
        &self,
        _credential: Option<&Credential>,
        _thread_id: &str,
        _message_ids: &[String],
    ) -> Result<()> {
        Err(Error::Transport("connection reset".to_string()))
    }
}

fn proposal_draft() -> MessageDraft {
    MessageDraft::with_proposal("Interested at $50k for 10%", ProposalData::new(50000.0, 10.0))
}

#[tokio::test]
async fn test_send_replaces_pending_with_sent() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    let sent = chat.send(proposal_draft()).await.expect("Failed to send");

    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 1);
    let message = &state.messages[0];
    assert_eq!(message.id, sent.id);
    assert!(!message.is_temporary());
    assert_eq!(message.status, MessageStatus::Sent);
    assert_eq!(message.content, "Interested at $50k for 10%");
    assert_eq!(message.proposal_data, Some(ProposalData::new(50000.0, 10.0)));
    assert_eq!(message.sender, ENTREPRENEUR);
    assert!(!state.sending);

    assert_eq!(store.thread_messages(THREAD).await.len(), 1);
}

#[tokio::test]
async fn test_send_shows_pending_before_store_answers() {
    let store = create_test_store().await;
    store.set_latency(Duration::from_millis(150));
    let chat = create_test_chat(&store);

    let sender = chat.clone();
    let task = tokio::spawn(async move { sender.send(proposal_draft()).await });

    sleep(Duration::from_millis(40)).await;
    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].status, MessageStatus::Pending);
    assert!(state.messages[0].is_temporary());
    assert!(state.sending);

    task.await.expect("task panicked").expect("Failed to send");
    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].status, MessageStatus::Sent);
    assert!(!state.sending);
}

#[tokio::test]
async fn test_send_failure_marks_failed() {
    let store = create_test_store().await;
    store.fail_next(1);
    let chat = create_test_chat(&store);

    let result = chat.send(proposal_draft()).await;
    assert!(matches!(result, Err(Error::Store { status: 500, .. })));

    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 1);
    let message = &state.messages[0];
    assert_eq!(message.status, MessageStatus::Failed);
    assert!(message.error_message.as_deref().is_some_and(|e| !e.is_empty()));
    assert_eq!(message.content, "Interested at $50k for 10%");
    assert!(!state.sending);
    // Send failures are per message, not a banner
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_send_rejects_empty_draft() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    let result = chat.send(MessageDraft::text("  ")).await;
    assert!(matches!(result, Err(Error::EmptyMessage)));
    assert!(chat.snapshot().await.messages.is_empty());
    assert_eq!(count(&store.stats().create_calls), 0);
}

#[tokio::test]
async fn test_send_without_credential_fails_that_message() {
    let store = create_test_store().await;
    let chat = ChatThread::new(Arc::new(store.clone()), THREAD, ENTREPRENEUR, None);

    let result = chat.send(MessageDraft::text("hello")).await;
    assert!(matches!(result, Err(Error::MissingCredential)));

    let state = chat.snapshot().await;
    assert_eq!(state.messages[0].status, MessageStatus::Failed);
    assert!(store.thread_messages(THREAD).await.is_empty());
}

#[tokio::test]
async fn test_concurrent_sends_get_independent_records() {
    let store = create_test_store().await;
    store.set_latency(Duration::from_millis(30));
    let chat = create_test_chat(&store);

    let (first, second) = tokio::join!(
        chat.send(MessageDraft::text("first")),
        chat.send(MessageDraft::text("second"))
    );
    let first = first.expect("first send");
    let second = second.expect("second send");
    assert_ne!(first.id, second.id);

    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.count_status(MessageStatus::Sent), 2);
    assert!(!state.sending);
}

#[tokio::test]
async fn test_retry_goes_pending_then_sent() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    store.fail_next(1);
    let _ = chat.send(proposal_draft()).await;
    let failed_id = chat.snapshot().await.messages[0].id.clone();

    store.set_latency(Duration::from_millis(150));
    let retrier = chat.clone();
    let id = failed_id.clone();
    let task = tokio::spawn(async move { retrier.retry(&id).await });

    sleep(Duration::from_millis(40)).await;
    let state = chat.snapshot().await;
    assert_eq!(state.get(&failed_id).map(|m| m.status), Some(MessageStatus::Pending));
    assert!(state.get(&failed_id).is_some_and(|m| m.error_message.is_none()));

    let confirmed = task.await.expect("task panicked").expect("Failed to retry");
    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].id, confirmed.id);
    assert_eq!(state.messages[0].status, MessageStatus::Sent);
    assert_eq!(count(&store.stats().retry_calls), 1);
    assert_eq!(store.thread_messages(THREAD).await.len(), 1);
}

#[tokio::test]
async fn test_retry_failure_reverts_to_failed() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    store.fail_next(2);
    let _ = chat.send(MessageDraft::text("hello")).await;
    let failed_id = chat.snapshot().await.messages[0].id.clone();

    let result = chat.retry(&failed_id).await;
    assert!(result.is_err());

    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].status, MessageStatus::Failed);
    assert!(state.messages[0].error_message.is_some());
}

#[tokio::test]
async fn test_retry_unknown_message() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    let result = chat.retry("does-not-exist").await;
    assert!(matches!(result, Err(Error::MessageNotFound(_))));
    assert_eq!(count(&store.stats().retry_calls), 0);
}

#[tokio::test]
async fn test_refresh_acknowledges_inbound_once() {
    let store = create_test_store().await;
    seed_inbound(&store, "What valuation are you targeting?").await;
    let chat = create_test_chat(&store);

    assert!(chat.refresh(false).await.expect("Failed to refresh"));
    assert_eq!(count(&store.stats().delivered_calls), 1);

    let state = chat.snapshot().await;
    assert_eq!(state.messages[0].status, MessageStatus::Delivered);
    assert_eq!(state.unread_count, 1);

    // Nothing left to acknowledge
    assert_eq!(chat.acknowledge_delivered().await, 0);
    assert_eq!(chat.acknowledge_delivered().await, 0);
    assert_eq!(count(&store.stats().delivered_calls), 1);

    // Store now reports the message delivered
    chat.refresh(true).await.expect("Failed to refresh");
    assert_eq!(count(&store.stats().delivered_calls), 1);
    assert_eq!(chat.snapshot().await.unread_count, 0);
}

#[tokio::test]
async fn test_acknowledge_ignores_own_messages() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    chat.send(MessageDraft::text("mine")).await.expect("Failed to send");
    assert_eq!(chat.acknowledge_delivered().await, 0);
    assert_eq!(count(&store.stats().delivered_calls), 0);
}

#[tokio::test]
async fn test_acknowledge_failure_is_not_surfaced() {
    let store = create_test_store().await;
    seed_inbound(&store, "hello").await;
    let chat = ChatThread::new(
        Arc::new(FailingDelivery(store.clone())),
        THREAD,
        ENTREPRENEUR,
        Some(Credential::new(ENTREPRENEUR_TOKEN)),
    );

    assert!(chat.refresh(false).await.expect("fetch itself succeeds"));

    let state = chat.snapshot().await;
    assert!(state.error.is_none());
    assert_eq!(state.messages[0].status, MessageStatus::Delivered);
}

#[tokio::test]
async fn test_non_silent_refresh_failure_sets_banner() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    store.fail_next(1);
    assert!(chat.refresh(false).await.is_err());

    let state = chat.snapshot().await;
    assert!(state.error.as_deref().is_some_and(|e| e.starts_with("Failed to load messages")));
    assert!(!state.loading);

    chat.dismiss_error().await;
    assert!(chat.snapshot().await.error.is_none());
}

#[tokio::test]
async fn test_silent_refresh_failure_only_logs() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    store.fail_next(2);
    assert!(chat.refresh(true).await.is_err());

    let state = chat.snapshot().await;
    assert!(state.error.is_none());
    assert!(!state.loading);
}

#[tokio::test]
async fn test_refresh_keeps_failed_message_visible() {
    let store = create_test_store().await;
    let chat = create_test_chat(&store);

    store.fail_next(1);
    let _ = chat.send(MessageDraft::text("lost")).await;
    seed_inbound(&store, "are you there?").await;

    chat.refresh(true).await.expect("Failed to refresh");

    let state = chat.snapshot().await;
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].content, "are you there?");
    assert_eq!(state.messages[1].status, MessageStatus::Failed);
}

#[tokio::test]
async fn test_refresh_skips_while_in_flight() {
    let store = create_test_store().await;
    store.set_latency(Duration::from_millis(100));
    let chat = create_test_chat(&store);

    let background = chat.clone();
    let task = tokio::spawn(async move { background.refresh(true).await });
    sleep(Duration::from_millis(20)).await;

    assert!(chat.is_fetching());
    assert!(!chat.refresh(true).await.expect("skip is not an error"));

    assert!(task.await.expect("task panicked").expect("Failed to refresh"));
    assert!(!chat.is_fetching());
    assert_eq!(count(&store.stats().list_calls), 1);
}
