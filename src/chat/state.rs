//! Local state of one negotiation thread
//!
//! Mutated by the synchronizer, the send pipeline and the delivery
//! acknowledger. Every update is keyed by message id so concurrent actors
//! never clobber unrelated entries, and at most one record exists per logical
//! message.

use crate::model::{Message, MessageStatus};

/// Snapshot-able state of a thread view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadState {
    /// Ordered messages
    pub messages: Vec<Message>,
    /// Unread count as last reported by the store
    pub unread_count: u64,
    /// A non-silent fetch is running
    pub loading: bool,
    /// At least one send is running
    pub sending: bool,
    /// Sends currently running
    active_sends: usize,
    /// Dismissible fetch error banner
    pub error: Option<String>,
    /// Incremented on every mutation
    pub revision: u64,
}

impl ThreadState {
    /// Empty state
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Look up a message by id
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Count messages in a status
    pub fn count_status(&self, status: MessageStatus) -> usize {
        self.messages.iter().filter(|m| m.status == status).count()
    }

    /// Append an optimistic record
    pub fn push_pending(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Replace the record `local_id` with the store's record
    ///
    /// If a poll already delivered the authoritative record (same id or same
    /// client key), that entry is updated and the local one dropped. A status
    /// the poll already advanced to `delivered` is kept. If the local record
    /// is gone as well, the authoritative record is appended.
    pub fn reconcile(&mut self, local_id: &str, server: Message) {
        let authoritative = self.messages.iter().position(|m| {
            m.id != local_id
                && (m.id == server.id
                    || (server.client_key.is_some() && m.client_key == server.client_key))
        });
        let local = self.messages.iter().position(|m| m.id == local_id);

        match (local, authoritative) {
            (Some(local), Some(existing)) => {
                self.messages[existing] = merge_status(&self.messages[existing], server);
                self.messages.remove(local);
            }
            (Some(local), None) => self.messages[local] = server,
            (None, Some(existing)) => {
                self.messages[existing] = merge_status(&self.messages[existing], server);
            }
            (None, None) => self.messages.push(server),
        }
        self.touch();
    }

    /// Mark `id` failed with `error`; returns false if absent
    pub fn fail(&mut self, id: &str, error: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.mark_failed(error);
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Put `id` back to pending, returning a copy; None if absent
    pub fn set_pending(&mut self, id: &str) -> Option<Message> {
        let message = self.messages.iter_mut().find(|m| m.id == id)?;
        message.mark_pending();
        let copy = message.clone();
        self.touch();
        Some(copy)
    }

    /// Take a fetched list as authoritative
    ///
    /// Local temporaries (pending or failed) whose client key is not present
    /// in the fetch are kept at the tail so in-flight and failed sends stay
    /// visible.
    pub fn apply_fetch(&mut self, fetched: Vec<Message>) {
        let retained: Vec<Message> = self
            .messages
            .drain(..)
            .filter(|local| {
                local.is_temporary()
                    && !fetched.iter().any(|remote| {
                        remote.id == local.id
                            || (local.client_key.is_some() && remote.client_key == local.client_key)
                    })
            })
            .collect();

        self.messages = fetched;
        self.messages.extend(retained);
        self.touch();
    }

    /// Mark the given ids delivered, returning how many changed
    pub fn mark_delivered(&mut self, ids: &[String]) -> usize {
        let mut changed = 0;
        for message in self.messages.iter_mut().filter(|m| ids.contains(&m.id)) {
            if message.status != MessageStatus::Delivered {
                message.mark_delivered();
                changed += 1;
            }
        }
        if changed > 0 {
            self.touch();
        }
        changed
    }

    /// Ids of `sent` messages not authored by `user_id`
    pub fn undelivered_inbound(&self, user_id: &str) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.status == MessageStatus::Sent && !m.is_own(user_id))
            .map(|m| m.id.clone())
            .collect()
    }

    /// Set the loading flag
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        self.touch();
    }

    /// Clear the loading flag left by an abandoned fetch
    pub fn clear_loading(&mut self) {
        if self.loading {
            self.set_loading(false);
        }
    }

    /// Record the start of a send
    pub fn begin_send(&mut self) {
        self.active_sends += 1;
        self.sending = true;
        self.touch();
    }

    /// Record the end of a send; `sending` clears once none remain
    pub fn end_send(&mut self) {
        self.active_sends = self.active_sends.saturating_sub(1);
        self.sending = self.active_sends > 0;
        self.touch();
    }

    /// Replace the unread count
    pub fn set_unread(&mut self, count: u64) {
        self.unread_count = count;
        self.touch();
    }

    /// Show an error banner
    pub fn set_error<S: Into<String>>(&mut self, error: S) {
        self.error = Some(error.into());
        self.touch();
    }

    /// Dismiss the error banner
    pub fn dismiss_error(&mut self) {
        if self.error.take().is_some() {
            self.touch();
        }
    }
}

/// Store copy of a message, never moving a delivered record back to sent
fn merge_status(existing: &Message, mut server: Message) -> Message {
    if existing.status == MessageStatus::Delivered && server.status == MessageStatus::Sent {
        server.status = MessageStatus::Delivered;
    }
    server
}
