//! In-process message store
//!
//! Backs the development server and the test suite. Bearer tokens are
//! registered against user ids; every operation resolves the viewer from the
//! credential first.

use crate::{
    model::{Message, MessageStatus},
    store::{require, CreateMessage, Credential, MessageStore},
    Error, Result,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-operation call counters
#[derive(Debug, Default)]
pub struct StoreStats {
    /// `list_messages` calls
    pub list_calls: AtomicUsize,
    /// `unread_count` calls
    pub unread_calls: AtomicUsize,
    /// `create_message` calls
    pub create_calls: AtomicUsize,
    /// `retry_message` calls
    pub retry_calls: AtomicUsize,
    /// `mark_delivered` calls
    pub delivered_calls: AtomicUsize,
    /// Requests currently being served
    in_flight: AtomicUsize,
    /// Highest number of requests served at the same time
    pub max_in_flight: AtomicUsize,
}

impl StoreStats {
    fn enter(&self, counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Requests currently being served
    pub fn in_flight(&self) -> usize {
        Self::get(&self.in_flight)
    }

    /// Read a counter
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Counts a request as served until dropped, including on cancellation
struct ServingGuard<'a>(&'a StoreStats);

impl Drop for ServingGuard<'_> {
    fn drop(&mut self) {
        self.0.exit();
    }
}

#[derive(Debug, Default)]
struct Inner {
    messages: Vec<Message>,
    tokens: HashMap<String, String>,
}

/// Message store held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    stats: Arc<StoreStats>,
    fail_next: Arc<AtomicU32>,
    latency_ms: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bearer token for a user
    pub async fn register_token(&self, token: &str, user_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.tokens.insert(token.to_string(), user_id.to_string());
        debug!("Registered token for user {}", user_id);
    }

    /// Make the next `count` requests fail with a 500
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Delay every request by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as usize, Ordering::SeqCst);
    }

    /// Call counters
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Resolve the user a credential belongs to
    pub async fn viewer(&self, credential: Option<&Credential>) -> Result<String> {
        let credential = require(credential)?;
        let inner = self.inner.lock().await;
        inner
            .tokens
            .get(credential.token())
            .cloned()
            .ok_or_else(|| Error::Unauthorized("unknown token".to_string()))
    }

    /// All messages of a thread in creation order
    pub async fn thread_messages(&self, thread_id: &str) -> Vec<Message> {
        let inner = self.inner.lock().await;
        inner
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect()
    }

    /// Unread messages of a thread for `viewer`
    pub async fn unread_for(&self, viewer: &str, thread_id: &str) -> u64 {
        let inner = self.inner.lock().await;
        inner
            .messages
            .iter()
            .filter(|m| {
                m.thread_id == thread_id
                    && m.sender != viewer
                    && m.status != MessageStatus::Delivered
            })
            .count() as u64
    }

    /// Create a message authored by `viewer`
    ///
    /// A request whose `client_key` was already stored returns the existing
    /// record instead of inserting a second one.
    pub async fn create_as(
        &self,
        viewer: &str,
        thread_id: &str,
        request: &CreateMessage,
    ) -> Message {
        let mut inner = self.inner.lock().await;

        if let Some(key) = &request.client_key {
            if let Some(existing) = inner
                .messages
                .iter()
                .find(|m| m.thread_id == thread_id && m.client_key.as_ref() == Some(key))
            {
                debug!("Create replayed for client key {}", key);
                return existing.clone();
            }
        }

        let message = Message {
            id: Uuid::new_v4().simple().to_string(),
            thread_id: thread_id.to_string(),
            sender: viewer.to_string(),
            content: request.content.clone(),
            proposal_data: request.proposal_data,
            message_type: request.message_type,
            created_at: Utc::now(),
            status: MessageStatus::Sent,
            error_message: None,
            client_key: request.client_key.clone(),
        };
        inner.messages.push(message.clone());
        info!("Stored message {} in thread {}", message.id, thread_id);
        message
    }

    /// Resubmit a message by id, falling back to its client key
    ///
    /// A message that never reached the store is created.
    pub async fn retry_as(
        &self,
        viewer: &str,
        thread_id: &str,
        message_id: &str,
        request: &CreateMessage,
    ) -> Result<Message> {
        {
            let mut inner = self.inner.lock().await;
            let found = inner.messages.iter_mut().find(|m| {
                m.thread_id == thread_id
                    && (m.id == message_id
                        || (request.client_key.is_some() && m.client_key == request.client_key))
            });

            if let Some(existing) = found {
                if existing.sender != viewer {
                    return Err(Error::Unauthorized(format!(
                        "message {} belongs to another user",
                        existing.id
                    )));
                }
                existing.content = request.content.clone();
                existing.proposal_data = request.proposal_data;
                existing.message_type = request.message_type;
                existing.error_message = None;
                if existing.status != MessageStatus::Delivered {
                    existing.status = MessageStatus::Sent;
                }
                info!("Updated message {} on retry", existing.id);
                return Ok(existing.clone());
            }
        }

        Ok(self.create_as(viewer, thread_id, request).await)
    }

    /// Mark inbound messages of `viewer` as delivered, returning how many changed
    pub async fn deliver_as(&self, viewer: &str, thread_id: &str, message_ids: &[String]) -> usize {
        let mut inner = self.inner.lock().await;
        let mut changed = 0;
        for message in inner.messages.iter_mut().filter(|m| {
            m.thread_id == thread_id && m.sender != viewer && message_ids.contains(&m.id)
        }) {
            if message.status != MessageStatus::Delivered {
                message.mark_delivered();
                changed += 1;
            }
        }
        debug!("Marked {} messages delivered in thread {}", changed, thread_id);
        changed
    }

    async fn begin(&self, counter: &AtomicUsize) -> Result<ServingGuard<'_>> {
        self.stats.enter(counter);
        let serving = ServingGuard(&self.stats);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency as u64)).await;
        }

        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            warn!("Injected store failure");
            return Err(Error::Store {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }

        Ok(serving)
    }
}

impl MessageStore for MemoryStore {
    async fn list_messages(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
    ) -> Result<Vec<Message>> {
        let _serving = self.begin(&self.stats.list_calls).await?;
        self.viewer(credential).await?;
        Ok(self.thread_messages(thread_id).await)
    }

    async fn unread_count(&self, credential: Option<&Credential>, thread_id: &str) -> Result<u64> {
        let _serving = self.begin(&self.stats.unread_calls).await?;
        let viewer = self.viewer(credential).await?;
        Ok(self.unread_for(&viewer, thread_id).await)
    }

    async fn create_message(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        request: &CreateMessage,
    ) -> Result<Message> {
        let _serving = self.begin(&self.stats.create_calls).await?;
        let viewer = self.viewer(credential).await?;
        Ok(self.create_as(&viewer, thread_id, request).await)
    }

    async fn retry_message(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        message_id: &str,
        request: &CreateMessage,
    ) -> Result<Message> {
        let _serving = self.begin(&self.stats.retry_calls).await?;
        let viewer = self.viewer(credential).await?;
        self.retry_as(&viewer, thread_id, message_id, request).await
    }

    async fn mark_delivered(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        message_ids: &[String],
    ) -> Result<()> {
        let _serving = self.begin(&self.stats.delivered_calls).await?;
        let viewer = self.viewer(credential).await?;
        self.deliver_as(&viewer, thread_id, message_ids).await;
        Ok(())
    }
}
