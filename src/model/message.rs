//! Negotiation messages and delivery status tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix marking a client-generated, not yet persisted message id
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Message delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Created optimistically, not yet confirmed by the store
    Pending,
    /// Confirmed by the store
    Sent,
    /// Observed by the recipient's client
    Delivered,
    /// Submission errored
    Failed,
}

impl Default for MessageStatus {
    fn default() -> Self {
        Self::Sent
    }
}

impl MessageStatus {
    /// Short glyph for list rendering
    pub fn indicator(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "↻",
            MessageStatus::Sent => "✓",
            MessageStatus::Delivered => "✓✓",
            MessageStatus::Failed => "✗",
        }
    }

    /// Lowercase label, matching the wire representation
    pub fn label(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
        }
    }
}

/// Kind of message within a negotiation thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain chat text
    Text,
    /// Carries a funding proposal (amount and/or equity)
    Proposal,
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Text
    }
}

/// Funding proposal attached to a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalData {
    /// Proposed investment amount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Proposed equity percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity: Option<f64>,
}

impl ProposalData {
    /// Create a proposal with both fields set
    pub fn new(amount: f64, equity: f64) -> Self {
        Self {
            amount: Some(amount),
            equity: Some(equity),
        }
    }

    /// True when neither amount nor equity is present
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.equity.is_none()
    }

    /// Human-readable summary, e.g. `$50000 for 10%`
    pub fn summary(&self) -> String {
        match (self.amount, self.equity) {
            (Some(amount), Some(equity)) => format!("${} for {}%", amount, equity),
            (Some(amount), None) => format!("${}", amount),
            (None, Some(equity)) => format!("{}% equity", equity),
            (None, None) => String::new(),
        }
    }
}

/// User-composed message before submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDraft {
    /// Text content
    pub content: String,
    /// Optional proposal
    pub proposal_data: Option<ProposalData>,
}

impl MessageDraft {
    /// Draft with text only
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            proposal_data: None,
        }
    }

    /// Draft with text and a proposal
    pub fn with_proposal<S: Into<String>>(content: S, proposal: ProposalData) -> Self {
        Self {
            content: content.into(),
            proposal_data: Some(proposal),
        }
    }

    /// True when the content is blank and no proposal field is set
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
            && self.proposal_data.map_or(true, |proposal| proposal.is_empty())
    }

    /// Message type implied by the draft
    pub fn message_type(&self) -> MessageType {
        match self.proposal_data {
            Some(proposal) if !proposal.is_empty() => MessageType::Proposal,
            _ => MessageType::Text,
        }
    }
}

/// A message in a negotiation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id, or a `temp-` id before persistence
    #[serde(rename = "_id")]
    pub id: String,
    /// Negotiation thread (funding request) id
    pub thread_id: String,
    /// Author user id
    pub sender: String,
    /// Text content
    #[serde(default)]
    pub content: String,
    /// Optional proposal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_data: Option<ProposalData>,
    /// Kind of message
    #[serde(default)]
    pub message_type: MessageType,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Delivery status
    #[serde(default)]
    pub status: MessageStatus,
    /// Error attached to a failed submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Client-supplied idempotency key, echoed back by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
}

impl Message {
    /// Build the optimistic local record for a draft
    ///
    /// The record gets a fresh `temp-<uuid>` id and the same uuid as its
    /// idempotency key, so concurrent sends never collide.
    pub fn new_pending(thread_id: &str, author: &str, draft: &MessageDraft) -> Self {
        let key = Uuid::new_v4().to_string();
        Self {
            id: format!("{}{}", TEMP_ID_PREFIX, key),
            thread_id: thread_id.to_string(),
            sender: author.to_string(),
            content: draft.content.clone(),
            proposal_data: draft.proposal_data,
            message_type: draft.message_type(),
            created_at: Utc::now(),
            status: MessageStatus::Pending,
            error_message: None,
            client_key: Some(key),
        }
    }

    /// True if the record has not been persisted by the store
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// True if authored by `user_id`
    pub fn is_own(&self, user_id: &str) -> bool {
        self.sender == user_id
    }

    /// Draft carrying this message's content, used for resubmission
    pub fn to_draft(&self) -> MessageDraft {
        MessageDraft {
            content: self.content.clone(),
            proposal_data: self.proposal_data,
        }
    }

    /// Mark as failed with an error
    pub fn mark_failed<S: Into<String>>(&mut self, error: S) {
        self.status = MessageStatus::Failed;
        self.error_message = Some(error.into());
    }

    /// Mark as pending resubmission
    pub fn mark_pending(&mut self) {
        self.status = MessageStatus::Pending;
        self.error_message = None;
    }

    /// Mark as delivered
    pub fn mark_delivered(&mut self) {
        self.status = MessageStatus::Delivered;
    }
}
