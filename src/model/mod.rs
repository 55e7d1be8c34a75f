//! Chat data model
//!
//! - `message` - Messages, drafts, proposals and delivery status

pub mod message;

pub use message::{Message, MessageDraft, MessageStatus, MessageType, ProposalData};
