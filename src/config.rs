//! Client settings
//!
//! Settings are stored as JSON and can be overridden from the environment.

use crate::{chat::PollConfig, store::Credential, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Store base URL override
pub const ENV_STORE_URL: &str = "STARTSMART_STORE_URL";
/// Bearer token override
pub const ENV_TOKEN: &str = "STARTSMART_TOKEN";
/// User id override
pub const ENV_USER: &str = "STARTSMART_USER";
/// Thread id override
pub const ENV_THREAD: &str = "STARTSMART_THREAD";

/// Client settings
///
/// # Example
/// ```rust,no_run
/// use startsmart_chat::config::Settings;
///
/// let mut settings = Settings::load("chat.json").expect("Failed to load");
/// settings.apply_env();
/// println!("Polling {} every {} ms", settings.store_url, settings.poll_interval_ms);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the message store
    pub store_url: String,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Whether background polling runs
    pub polling_enabled: bool,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Current user id
    pub user_id: String,
    /// Negotiation thread to open
    pub thread_id: String,
    /// Bearer token, if already known
    pub auth_token: Option<String>,
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// Returns defaults if the file doesn't exist or is empty.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read settings: {}", e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a JSON file, creating parent directories
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create settings directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| Error::Config(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }

    /// Apply `STARTSMART_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a lookup function
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_STORE_URL) {
            self.store_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.auth_token = Some(token).filter(|t| !t.trim().is_empty());
        }
        if let Some(user) = lookup(ENV_USER) {
            self.user_id = user;
        }
        if let Some(thread) = lookup(ENV_THREAD) {
            self.thread_id = thread;
        }
    }

    /// Reject values the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Polling parameters
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            enabled: self.polling_enabled,
        }
    }

    /// Request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Credential built from `auth_token`
    pub fn credential(&self) -> Option<Credential> {
        self.auth_token.as_deref().map(Credential::new)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: "http://127.0.0.1:5000".to_string(),
            poll_interval_ms: 5000,
            polling_enabled: true,
            request_timeout_secs: 10,
            user_id: String::new(),
            thread_id: String::new(),
            auth_token: None,
        }
    }
}
