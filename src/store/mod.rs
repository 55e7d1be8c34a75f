//! Message store module
//!
//! The message store is the durable source of truth for negotiation threads.
//! This module defines the seam the chat pipeline talks to:
//! - `http` - REST client for a remote store
//! - `memory` - In-process store used by the development server and tests
//!
//! Every call receives the bearer credential explicitly; a missing credential
//! is reported as `Error::MissingCredential` for that call only.

pub mod http;
pub mod memory;

use crate::{
    model::{Message, MessageDraft, MessageType, ProposalData},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

pub use http::HttpMessageStore;
pub use memory::MemoryStore;

/// Bearer credential for store requests
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    /// Raw token value
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Parse an `Authorization` header value
    pub fn from_header(value: &str) -> Option<Self> {
        value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Self::new)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Require a credential, turning its absence into a per-call error
pub fn require(credential: Option<&Credential>) -> Result<&Credential> {
    credential.ok_or(Error::MissingCredential)
}

/// Body of a create or retry request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessage {
    /// Text content
    #[serde(default)]
    pub content: String,
    /// Optional proposal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_data: Option<ProposalData>,
    /// Kind of message
    #[serde(default)]
    pub message_type: MessageType,
    /// Idempotency key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
}

impl CreateMessage {
    /// Build a request from a draft and its idempotency key
    pub fn from_draft(draft: &MessageDraft, client_key: Option<String>) -> Self {
        Self {
            content: draft.content.clone(),
            proposal_data: draft.proposal_data,
            message_type: draft.message_type(),
            client_key,
        }
    }

    /// Build a resubmission request for an existing local record
    pub fn from_message(message: &Message) -> Self {
        Self::from_draft(&message.to_draft(), message.client_key.clone())
    }
}

/// Unread count response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    /// Messages not yet seen by the viewer
    pub count: u64,
}

/// Batched delivery acknowledgement body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredRequest {
    /// Ids to mark as delivered
    pub message_ids: Vec<String>,
}

/// Operations the chat pipeline needs from a message store
pub trait MessageStore: Send + Sync + 'static {
    /// Fetch all messages of a thread, in order
    fn list_messages(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send;

    /// Fetch the viewer's unread count for a thread
    fn unread_count(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Create a message and return the authoritative record
    fn create_message(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        request: &CreateMessage,
    ) -> impl Future<Output = Result<Message>> + Send;

    /// Resubmit a message by id and return the authoritative record
    fn retry_message(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        message_id: &str,
        request: &CreateMessage,
    ) -> impl Future<Output = Result<Message>> + Send;

    /// Mark a batch of messages as delivered
    fn mark_delivered(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        message_ids: &[String],
    ) -> impl Future<Output = Result<()>> + Send;
}
