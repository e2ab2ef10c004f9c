//! HTTP client for the backend chat service.

use super::types::{BackendResponse, ChatRequest, MessageData};
use crate::config::BackendConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::time::Duration;

/// Something that answers free-text messages. The pipeline only talks to the backend through this.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Forward one message. Never fails; failures come back as `BackendResponse::Failure`.
    async fn send_chat_message(&self, message: &MessageData) -> BackendResponse;

    /// Short probe; any error means unhealthy.
    async fn health_check(&self) -> bool;
}

/// reqwest-based `ChatBackend`.
#[derive(Clone)]
pub struct BackendClient {
    chat_url: String,
    health_url: String,
    health_timeout: Duration,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(default_headers(config))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("backend: client builder failed ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            chat_url: config.chat_url(),
            health_url: config.health_url(),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
            client,
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Map a transport error onto the three failure kinds.
    fn classify_error(&self, err: &reqwest::Error) -> BackendResponse {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            log::error!(
                "backend: no response from {} (is the backend running?): {}",
                self.chat_url,
                err
            );
            BackendResponse::failure("No response from backend service")
        } else {
            log::error!("backend: unexpected error: {}", err);
            BackendResponse::failure("Unexpected error occurred")
        }
    }
}

/// Configured extra headers. Invalid names or values are skipped with a warning.
fn default_headers(config: &BackendConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                headers.insert(n, v);
            }
            _ => log::warn!("backend: skipping invalid header {}", name),
        }
    }
    headers
}

/// Body as JSON when it parses, as a JSON string otherwise; None when empty.
fn body_value(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())))
}

#[async_trait]
impl ChatBackend for BackendClient {
    /// POST {chat_url} with `{ "message": text }`.
    async fn send_chat_message(&self, message: &MessageData) -> BackendResponse {
        log::info!(
            "backend: sending message for conversation {} to {}",
            message.conversation_id,
            self.chat_url
        );
        let res = match self
            .client
            .post(&self.chat_url)
            .json(&ChatRequest {
                message: &message.text,
            })
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => return self.classify_error(&e),
        };
        let status = res.status();
        let body = match res.text().await {
            Ok(b) => b,
            Err(e) => return self.classify_error(&e),
        };
        if !status.is_success() {
            log::error!("backend: server error {}: {}", status.as_u16(), body);
            return BackendResponse::Failure {
                message: format!("Server error: {}", status.as_u16()),
                data: body_value(&body),
            };
        }
        log::debug!("backend: response {}", body);
        BackendResponse::Success {
            data: body_value(&body),
        }
    }

    /// GET {base_url}/health with the short health timeout.
    async fn health_check(&self) -> bool {
        match self
            .client
            .get(&self.health_url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(res) => res.status() == reqwest::StatusCode::OK,
            Err(e) => {
                log::warn!("backend: health check failed: {}", e);
                false
            }
        }
    }
}
