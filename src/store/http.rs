//! REST client for a remote message store

use crate::{
    model::Message,
    store::{require, CreateMessage, Credential, DeliveredRequest, MessageStore, UnreadCount},
    Error, Result,
};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Message store reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpMessageStore {
    /// Base URL, e.g. `http://localhost:5000`
    base_url: String,
    base: Url,
    client: Client,
}

impl HttpMessageStore {
    /// Create a client for `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("Invalid store URL {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("Invalid store URL {}", base_url)));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            base,
            client,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/api/chat/{segments..}`, each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "chat"]).extend(segments);
        }
        url
    }

    async fn execute(&self, request: RequestBuilder, credential: &Credential) -> Result<Response> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, credential.bearer())
            .send()
            .await
            .map_err(|e| {
                error!("Message store request failed: {}", e);
                Error::Transport(format!("Request failed: {}", e))
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Message store answered {}: {}", status, body);
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized(body));
        }
        Err(Error::Store {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder, credential: &Credential) -> Result<T> {
        let response = self.execute(request, credential).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl MessageStore for HttpMessageStore {
    async fn list_messages(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
    ) -> Result<Vec<Message>> {
        let credential = require(credential)?;
        let url = self.url(&[thread_id, "messages"]);
        debug!("GET {}", url);
        self.json(self.client.get(url), credential).await
    }

    async fn unread_count(&self, credential: Option<&Credential>, thread_id: &str) -> Result<u64> {
        let credential = require(credential)?;
        let url = self.url(&[thread_id, "unread"]);
        debug!("GET {}", url);
        let unread: UnreadCount = self.json(self.client.get(url), credential).await?;
        Ok(unread.count)
    }

    async fn create_message(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        request: &CreateMessage,
    ) -> Result<Message> {
        let credential = require(credential)?;
        let url = self.url(&[thread_id, "messages"]);
        debug!("POST {}", url);
        self.json(self.client.post(url).json(request), credential).await
    }

    async fn retry_message(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        message_id: &str,
        request: &CreateMessage,
    ) -> Result<Message> {
        let credential = require(credential)?;
        let url = self.url(&[thread_id, "messages", message_id, "retry"]);
        debug!("PUT {}", url);
        self.json(self.client.put(url).json(request), credential).await
    }

    async fn mark_delivered(
        &self,
        credential: Option<&Credential>,
        thread_id: &str,
        message_ids: &[String],
    ) -> Result<()> {
        let credential = require(credential)?;
        let url = self.url(&[thread_id, "delivered"]);
        debug!("PUT {} ({} ids)", url, message_ids.len());
        let body = DeliveredRequest {
            message_ids: message_ids.to_vec(),
        };
        self.execute(self.client.put(url).json(&body), credential)
            .await
            .map(|_| ())
    }
}
