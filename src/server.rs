//! Development message store server
//!
//! Serves a `MemoryStore` over the same REST routes `HttpMessageStore`
//! talks to:
//! - `GET  /api/chat/{thread}/messages`
//! - `POST /api/chat/{thread}/messages`
//! - `GET  /api/chat/{thread}/unread`
//! - `PUT  /api/chat/{thread}/messages/{id}/retry`
//! - `PUT  /api/chat/{thread}/delivered`
//! - `GET  /health`
//!
//! The viewer is resolved from the `Authorization: Bearer` header.

use crate::{
    store::{CreateMessage, Credential, DeliveredRequest, MemoryStore, UnreadCount},
    Error, Result,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// HTTP front-end for a `MemoryStore`
pub struct StoreServer {
    store: MemoryStore,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
}

impl StoreServer {
    /// Wrap a store; call `start` to begin serving
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            local_addr: None,
            accept_task: None,
        }
    }

    /// The served store
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Bind to `addr` and serve in the background
    pub async fn start(&mut self, addr: SocketAddr) -> Result<SocketAddr> {
        info!("Starting message store server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("Failed to bind to {}: {}", addr, e)))?;

        // Port 0 resolves to the assigned port here
        let actual_addr = listener
            .local_addr()
            .map_err(|e| Error::Transport(format!("Failed to get local address: {}", e)))?;
        self.local_addr = Some(actual_addr);

        let store = self.store.clone();
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, remote_addr)) => {
                        debug!("Accepted connection from {}", remote_addr);

                        let io = TokioIo::new(stream);
                        let store = store.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| handle_request(req, store.clone()));

                            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                error!("Error serving connection: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        });
        self.accept_task = Some(task);

        info!("Message store listening on {}", actual_addr);
        Ok(actual_addr)
    }

    /// Address the server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Base URL for clients, once started
    pub fn base_url(&self) -> Option<String> {
        self.local_addr.map(|addr| format!("http://{}", addr))
    }

    /// Stop accepting connections
    pub fn shutdown(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
            info!("Message store server stopped");
        }
    }
}

impl Drop for StoreServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Serialization failed: {}", e))
        }
    }
}

fn error_response(error: &Error) -> Response<Full<Bytes>> {
    let status = match error {
        Error::MissingCredential | Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::Store { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Error::JsonSerialization(_) | Error::EmptyMessage => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    text_response(status, error.to_string())
}

/// Routes a request to the store
async fn handle_request(
    req: Request<Incoming>,
    store: MemoryStore,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("Received {} {}", method, path);

    if method == Method::GET && path == "/health" {
        return Ok(text_response(StatusCode::OK, "ok"));
    }

    let credential = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(Credential::from_header);

    // Thread and message ids arrive percent-encoded
    let segments: Vec<String> = path
        .trim_matches('/')
        .split('/')
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .collect();
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    let body = req.collect().await?.to_bytes();

    let viewer = match segments.as_slice() {
        ["api", "chat", ..] => match store.viewer(credential.as_ref()).await {
            Ok(viewer) => viewer,
            Err(e) => {
                warn!("Rejected {} {}: {}", method, path, e);
                return Ok(error_response(&e));
            }
        },
        _ => return Ok(text_response(StatusCode::NOT_FOUND, "Not Found")),
    };

    let response = match (&method, segments.as_slice()) {
        (&Method::GET, ["api", "chat", thread, "messages"]) => {
            json_response(StatusCode::OK, &store.thread_messages(thread).await)
        }
        (&Method::POST, ["api", "chat", thread, "messages"]) => {
            match serde_json::from_slice::<CreateMessage>(&body) {
                Ok(request) => {
                    let message = store.create_as(&viewer, thread, &request).await;
                    json_response(StatusCode::CREATED, &message)
                }
                Err(e) => error_response(&Error::JsonSerialization(e)),
            }
        }
        (&Method::GET, ["api", "chat", thread, "unread"]) => {
            let count = store.unread_for(&viewer, thread).await;
            json_response(StatusCode::OK, &UnreadCount { count })
        }
        (&Method::PUT, ["api", "chat", thread, "messages", id, "retry"]) => {
            match serde_json::from_slice::<CreateMessage>(&body) {
                Ok(request) => match store.retry_as(&viewer, thread, id, &request).await {
                    Ok(message) => json_response(StatusCode::OK, &message),
                    Err(e) => error_response(&e),
                },
                Err(e) => error_response(&Error::JsonSerialization(e)),
            }
        }
        (&Method::PUT, ["api", "chat", thread, "delivered"]) => {
            match serde_json::from_slice::<DeliveredRequest>(&body) {
                Ok(request) => {
                    let updated = store.deliver_as(&viewer, thread, &request.message_ids).await;
                    json_response(StatusCode::OK, &serde_json::json!({ "updated": updated }))
                }
                Err(e) => error_response(&Error::JsonSerialization(e)),
            }
        }
        _ => {
            debug!("Unsupported request: {} {}", method, path);
            text_response(StatusCode::NOT_FOUND, "Not Found")
        }
    };

    Ok(response)
}
