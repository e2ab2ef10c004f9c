//! Reply delivery: the per-request turn context and the channel-service connector client.

use super::auth::{TokenProvider, TokenSource};
use crate::activity::{Activity, OutboundMessage};
use crate::config::BotConfig;
use crate::context::TurnContext;
use crate::error::BotError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("connector request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("connector api error: {0}")]
    Api(String),
    #[error("connector auth failed: {0}")]
    Auth(String),
}

/// Posts reply activities to the channel service named by the inbound activity's `serviceUrl`.
pub struct ConnectorClient {
    tokens: TokenProvider,
    client: reqwest::Client,
}

impl ConnectorClient {
    pub fn new(source: TokenSource, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("connector: client builder failed ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            tokens: TokenProvider::new(source),
            client,
        }
    }

    pub fn from_config(bot: &BotConfig) -> Self {
        Self::new(
            TokenSource::from_config(bot),
            Duration::from_millis(bot.connector_timeout_ms),
        )
    }

    pub fn token_source(&self) -> &TokenSource {
        self.tokens.source()
    }

    /// POST {serviceUrl}/v3/conversations/{id}/activities[/{replyToId}].
    pub async fn reply(
        &self,
        service_url: &str,
        to: &Activity,
        reply: &Value,
    ) -> Result<(), ConnectorError> {
        let url = reply_url(service_url, to);
        let mut req = self.client.post(&url).json(reply);
        if let Some(token) = self.tokens.token(&self.client).await? {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ConnectorError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }
}

/// Ids are percent-encoded as single path segments (Teams ids carry ':', ';' and '@').
fn reply_url(service_url: &str, to: &Activity) -> String {
    let base = format!(
        "{}/v3/conversations/{}/activities",
        service_url.trim_end_matches('/'),
        urlencoding::encode(&to.conversation.id)
    );
    match to.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => format!("{}/{}", base, urlencoding::encode(id)),
        None => base,
    }
}

/// Turn context for one HTTP request. Replies go through the connector when the activity names a
/// service URL, otherwise they are buffered and returned in the HTTP response.
pub struct HttpTurnContext {
    activity: Activity,
    connector: Arc<ConnectorClient>,
    bot_id: Option<String>,
    buffered: Mutex<Vec<Value>>,
}

impl HttpTurnContext {
    pub fn new(activity: Activity, connector: Arc<ConnectorClient>, bot_id: Option<String>) -> Self {
        Self {
            activity,
            connector,
            bot_id,
            buffered: Mutex::new(Vec::new()),
        }
    }

    /// Replies not delivered through the connector, in send order.
    pub async fn take_buffered(&self) -> Vec<Value> {
        std::mem::take(&mut *self.buffered.lock().await)
    }
}

#[async_trait]
impl TurnContext for HttpTurnContext {
    fn activity(&self) -> &Activity {
        &self.activity
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), BotError> {
        let mut reply = message.to_reply_activity(&self.activity);
        if reply.get("from").is_none() {
            if let Some(ref id) = self.bot_id {
                reply["from"] = serde_json::json!({ "id": id });
            }
        }
        match self.activity.service_url.as_deref().filter(|u| !u.is_empty()) {
            Some(service_url) => self
                .connector
                .reply(service_url, &self.activity, &reply)
                .await
                .map_err(|e| BotError::Send(e.to_string())),
            None => {
                self.buffered.lock().await.push(reply);
                Ok(())
            }
        }
    }
}
