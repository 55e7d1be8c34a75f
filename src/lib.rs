//! StartSmart negotiation chat
//!
//! This library provides the client side of the StartSmart funding-negotiation
//! chat: an optimistic send pipeline, a polling synchronizer with a
//! single-flight guard, and a delivery acknowledger, all built on top of a
//! pluggable message store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chat;
pub mod config;
pub mod model;
pub mod server;
pub mod store;
pub mod tui;

#[cfg(test)]
mod tests;

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chat operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No bearer credential was supplied for a store call
    #[error("Not authenticated: no credential available")]
    MissingCredential,

    /// The credential was rejected by the store
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A draft with neither content nor proposal data was submitted
    #[error("Message must have content or a proposal")]
    EmptyMessage,

    /// The referenced message is not in the local thread state
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// The message store answered with a non-success status
    #[error("Store error ({status}): {message}")]
    Store {
        /// HTTP status code returned by the store
        status: u16,
        /// Error message returned by the store
        message: String,
    },

    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// HTTP/Hyper error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
}

/// Initialize logging for the library
///
/// Honors `RUST_LOG`, defaulting to `info` for this crate.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("startsmart_chat=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
