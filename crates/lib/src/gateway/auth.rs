//! Bearer tokens for the channel service connector.
//!
//! A fixed token from config wins. Otherwise `appType` "UserAssignedMsi" fetches from the managed
//! identity endpoint, and an app id plus password use the client credentials grant. Fetched tokens
//! are cached until shortly before they expire.

use super::connector::ConnectorError;
use crate::config::BotConfig;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const BOT_FRAMEWORK_SCOPE: &str = "https://api.botframework.com/.default";
const BOT_FRAMEWORK_RESOURCE: &str = "https://api.botframework.com";
const DEFAULT_TENANT: &str = "botframework.com";
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const DEFAULT_EXPIRES_IN: u64 = 3600;
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Where connector bearer tokens come from.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenSource {
    /// No authentication (local emulators and tests).
    None,
    Static(String),
    ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
    },
    ManagedIdentity {
        token_url: String,
        client_id: Option<String>,
    },
}

impl TokenSource {
    pub fn from_config(bot: &BotConfig) -> Self {
        if let Some(ref token) = bot.connector_token {
            return TokenSource::Static(token.clone());
        }
        let managed = bot
            .app_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("UserAssignedMsi"));
        if managed {
            return TokenSource::ManagedIdentity {
                token_url: bot
                    .token_endpoint
                    .clone()
                    .unwrap_or_else(|| IMDS_TOKEN_URL.to_string()),
                client_id: bot.app_id.clone(),
            };
        }
        match (&bot.app_id, &bot.app_password) {
            (Some(id), Some(secret)) => {
                let tenant = bot.tenant_id.as_deref().unwrap_or(DEFAULT_TENANT);
                TokenSource::ClientCredentials {
                    token_url: bot.token_endpoint.clone().unwrap_or_else(|| {
                        format!(
                            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
                            tenant
                        )
                    }),
                    client_id: id.clone(),
                    client_secret: secret.clone(),
                }
            }
            _ => TokenSource::None,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds; the managed identity endpoint sends it as a string.
    #[serde(default)]
    expires_in: Option<Value>,
}

fn expires_in_secs(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .unwrap_or(DEFAULT_EXPIRES_IN)
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Hands out a valid bearer token per reply, fetching and caching as the source requires.
pub struct TokenProvider {
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &TokenSource {
        &self.source
    }

    /// Token for the next request; None when the source is `TokenSource::None`.
    pub async fn token(&self, client: &reqwest::Client) -> Result<Option<String>, ConnectorError> {
        let request = match self.source {
            TokenSource::None => return Ok(None),
            TokenSource::Static(ref token) => return Ok(Some(token.clone())),
            TokenSource::ClientCredentials {
                ref token_url,
                ref client_id,
                ref client_secret,
            } => client.post(token_url).form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", BOT_FRAMEWORK_SCOPE),
            ]),
            TokenSource::ManagedIdentity {
                ref token_url,
                ref client_id,
            } => {
                let mut query = vec![
                    ("api-version", IMDS_API_VERSION),
                    ("resource", BOT_FRAMEWORK_RESOURCE),
                ];
                if let Some(id) = client_id {
                    query.push(("client_id", id.as_str()));
                }
                client.get(token_url).query(&query).header("Metadata", "true")
            }
        };

        let mut cached = self.cached.lock().await;
        if let Some(ref c) = *cached {
            if Instant::now() < c.refresh_at {
                return Ok(Some(c.token.clone()));
            }
        }

        log::debug!("connector: fetching bearer token");
        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ConnectorError::Auth(format!("token endpoint returned {}: {}", status, body)));
        }
        let body: TokenResponse = res
            .json()
            .await
            .map_err(|e| ConnectorError::Auth(format!("invalid token response: {}", e)))?;
        let lifetime = Duration::from_secs(expires_in_secs(body.expires_in.as_ref()));
        *cached = Some(CachedToken {
            token: body.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_SKEW),
        });
        Ok(Some(body.access_token))
    }
}
