//! Negotiation chat module
//!
//! This module ties a message store to the local view of one thread:
//! - Optimistic send pipeline (`ChatThread::send`)
//! - Retry of failed messages (`ChatThread::retry`)
//! - Delivery acknowledgement of inbound messages
//! - Fetch cycles driven by the polling synchronizer (`poller`)
//!
//! The store is always the source of truth; local updates are keyed by
//! message id and reconciled with whatever the store returns.

pub mod poller;
pub mod state;

pub use poller::{PollConfig, PollHandle, Synchronizer};
pub use state::ThreadState;

use crate::{
    model::{Message, MessageDraft},
    store::{CreateMessage, Credential, MessageStore},
    Error, Result,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Client-side view of one negotiation thread
pub struct ChatThread<S: MessageStore> {
    store: Arc<S>,
    thread_id: String,
    user_id: String,
    credential: Option<Credential>,
    pub(crate) state: Arc<RwLock<ThreadState>>,
    /// Single-flight guard for fetch cycles
    pub(crate) in_flight: Arc<AtomicBool>,
    /// Bumped on teardown; results of older cycles are discarded
    pub(crate) generation: Arc<AtomicU64>,
}

impl<S: MessageStore> Clone for ChatThread<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            thread_id: self.thread_id.clone(),
            user_id: self.user_id.clone(),
            credential: self.credential.clone(),
            state: self.state.clone(),
            in_flight: self.in_flight.clone(),
            generation: self.generation.clone(),
        }
    }
}

/// Clears the single-flight flag when a cycle ends, unless a teardown
/// happened in between
///
/// A non-silent cycle torn down before it settled also clears `loading`.
struct FlightGuard {
    in_flight: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    state: Arc<RwLock<ThreadState>>,
    started_at: u64,
    silent: bool,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if self.generation.load(Ordering::SeqCst) == self.started_at {
            self.in_flight.store(false, Ordering::SeqCst);
        } else if !self.silent {
            if let Ok(mut state) = self.state.try_write() {
                state.clear_loading();
            }
        }
    }
}

impl<S: MessageStore> ChatThread<S> {
    /// Create a view of `thread_id` for `user_id`
    ///
    /// The credential is attached to every store call; `None` makes each
    /// call fail with `Error::MissingCredential` without affecting the others.
    pub fn new(
        store: Arc<S>,
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            store,
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            credential,
            state: Arc::new(RwLock::new(ThreadState::new())),
            in_flight: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Thread id
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Current user id
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> ThreadState {
        self.state.read().await.clone()
    }

    /// Copy of the current state, for callers outside the runtime
    pub fn blocking_snapshot(&self) -> ThreadState {
        self.state.blocking_read().clone()
    }

    /// Dismiss the fetch error banner
    pub async fn dismiss_error(&self) {
        self.state.write().await.dismiss_error();
    }

    /// True while a fetch cycle holds the single-flight guard
    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Send a draft optimistically
    ///
    /// The temporary record is visible as `pending` before the store is
    /// contacted. On success it is replaced by the store's record; on failure
    /// it stays in place as `failed` with the error attached.
    pub async fn send(&self, draft: MessageDraft) -> Result<Message> {
        if draft.is_empty() {
            return Err(Error::EmptyMessage);
        }

        let pending = Message::new_pending(&self.thread_id, &self.user_id, &draft);
        let local_id = pending.id.clone();
        let request = CreateMessage::from_message(&pending);

        {
            let mut state = self.state.write().await;
            state.push_pending(pending);
            state.begin_send();
        }
        debug!("Queued optimistic message {} in thread {}", local_id, self.thread_id);

        let result = self
            .store
            .create_message(self.credential(), &self.thread_id, &request)
            .await;

        let mut state = self.state.write().await;
        state.end_send();
        match result {
            Ok(server) => {
                info!("Message {} confirmed as {}", local_id, server.id);
                state.reconcile(&local_id, server.clone());
                Ok(server)
            }
            Err(e) => {
                warn!("Failed to send message {}: {}", local_id, e);
                state.fail(&local_id, &e.to_string());
                Err(e)
            }
        }
    }

    /// Resubmit the message `message_id`
    ///
    /// The message is `pending` as soon as this is called and ends up either
    /// replaced by the store's record or `failed` with the new error.
    pub async fn retry(&self, message_id: &str) -> Result<Message> {
        let message = self
            .state
            .write()
            .await
            .set_pending(message_id)
            .ok_or_else(|| Error::MessageNotFound(message_id.to_string()))?;

        info!("Retrying message {}", message_id);
        let request = CreateMessage::from_message(&message);

        let result = self
            .store
            .retry_message(self.credential(), &self.thread_id, message_id, &request)
            .await;

        let mut state = self.state.write().await;
        match result {
            Ok(server) => {
                info!("Retry of {} confirmed as {}", message_id, server.id);
                state.reconcile(message_id, server.clone());
                Ok(server)
            }
            Err(e) => {
                warn!("Retry of {} failed: {}", message_id, e);
                state.fail(message_id, &e.to_string());
                Err(e)
            }
        }
    }

    /// Acknowledge inbound `sent` messages as delivered
    ///
    /// Local state is updated first; one batched request follows. A failed
    /// request is only logged. Returns the number of messages acknowledged,
    /// zero without any request when nothing is undelivered.
    pub async fn acknowledge_delivered(&self) -> usize {
        let ids = {
            let mut state = self.state.write().await;
            let ids = state.undelivered_inbound(&self.user_id);
            if ids.is_empty() {
                return 0;
            }
            state.mark_delivered(&ids);
            ids
        };

        match self
            .store
            .mark_delivered(self.credential(), &self.thread_id, &ids)
            .await
        {
            Ok(()) => debug!("Acknowledged {} messages in thread {}", ids.len(), self.thread_id),
            Err(e) => warn!("Failed to mark {} messages delivered: {}", ids.len(), e),
        }
        ids.len()
    }

    /// Run one fetch cycle: messages, then the unread count
    ///
    /// Returns `Ok(false)` without contacting the store if another cycle is
    /// still in flight. A non-silent cycle toggles `loading` and surfaces
    /// errors in the banner; a silent one only logs them.
    pub async fn refresh(&self, silent: bool) -> Result<bool> {
        let generation = self.generation.load(Ordering::SeqCst);
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Fetch for thread {} skipped, previous still in flight", self.thread_id);
            return Ok(false);
        }
        let _guard = FlightGuard {
            in_flight: self.in_flight.clone(),
            generation: self.generation.clone(),
            state: self.state.clone(),
            started_at: generation,
            silent,
        };

        if !silent {
            self.state.write().await.set_loading(true);
        }

        let messages = self
            .store
            .list_messages(self.credential(), &self.thread_id)
            .await;
        let unread = self
            .store
            .unread_count(self.credential(), &self.thread_id)
            .await;

        if !self.is_current(generation) {
            debug!("Discarding fetch for thread {} after teardown", self.thread_id);
            if !silent {
                self.state.write().await.clear_loading();
            }
            return Ok(false);
        }

        let mut first_error = None;
        let has_messages = {
            let mut state = self.state.write().await;

            let has_messages = match messages {
                Ok(messages) => {
                    debug!("Fetched {} messages for thread {}", messages.len(), self.thread_id);
                    let non_empty = !messages.is_empty();
                    state.apply_fetch(messages);
                    non_empty
                }
                Err(e) => {
                    warn!("Failed to fetch messages for thread {}: {}", self.thread_id, e);
                    first_error = Some(e);
                    false
                }
            };

            match unread {
                Ok(count) => state.set_unread(count),
                Err(e) => {
                    warn!("Failed to fetch unread count for thread {}: {}", self.thread_id, e);
                    first_error.get_or_insert(e);
                }
            }

            if !silent {
                if let Some(e) = &first_error {
                    state.set_error(format!("Failed to load messages: {}", e));
                }
                state.set_loading(false);
            }
            has_messages
        };

        if has_messages {
            self.acknowledge_delivered().await;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }
}
