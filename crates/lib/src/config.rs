//! Configuration types and loading.
//!
//! Config is loaded once at process start from a JSON file (e.g. `~/.deskbot/config.json`)
//! and then from environment overrides. It is immutable afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Messaging endpoint bind and port.
    #[serde(default)]
    pub server: ServerConfig,

    /// Backend chat service.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Bot identity, credentials, and command prefix.
    #[serde(default)]
    pub bot: BotConfig,

    /// Conversation state storage.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the messaging endpoint (default 3978).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

/// Backend HTTP service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the backend (default http://localhost:3001). Overridden by BACKEND_SERVICE_URL.
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,

    /// Chat endpoint: absolute URL, or a path joined to `base_url` (default "/chat"). Overridden by BOT_ENDPOINT.
    #[serde(default = "default_backend_endpoint")]
    pub endpoint: String,

    /// Request timeout for chat calls in milliseconds.
    #[serde(default = "default_backend_timeout_ms")]
    pub timeout_ms: u64,

    /// Timeout for the health probe in milliseconds.
    #[serde(default = "default_backend_health_timeout_ms")]
    pub health_timeout_ms: u64,

    /// Extra headers sent with every backend request (e.g. an API key).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Bot identity and credential parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// Application (client) id. Overridden by CLIENT_ID.
    pub app_id: Option<String>,
    /// App type, e.g. "MultiTenant" or "UserAssignedMsi". Overridden by BOT_TYPE.
    pub app_type: Option<String>,
    /// Tenant id. Overridden by TENANT_ID.
    pub tenant_id: Option<String>,
    /// App password. Overridden by CLIENT_PASSWORD.
    pub app_password: Option<String>,
    /// Fixed bearer token for posting replies to the channel service. Overridden by
    /// BOT_CONNECTOR_TOKEN. When unset, tokens are obtained from `appId`/`appPassword` (client
    /// credentials) or, with `appType` "UserAssignedMsi", from the managed identity endpoint.
    pub connector_token: Option<String>,
    /// Token endpoint override. Default: the Microsoft identity platform endpoint for `tenantId`
    /// (or "botframework.com"), or the instance metadata endpoint for managed identity.
    pub token_endpoint: Option<String>,
    /// Request timeout for connector and token calls in milliseconds.
    #[serde(default = "default_connector_timeout_ms")]
    pub connector_timeout_ms: u64,
    /// Prefix that marks a message as a command (default '/').
    #[serde(default = "default_command_prefix")]
    pub command_prefix: char,
}

/// Conversation state storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// When set, conversation state is persisted to this JSON file. Otherwise it lives in memory.
    pub path: Option<PathBuf>,
}

fn default_server_port() -> u16 {
    3978
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_backend_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_backend_endpoint() -> String {
    "/chat".to_string()
}

fn default_backend_timeout_ms() -> u64 {
    5_000
}

fn default_backend_health_timeout_ms() -> u64 {
    2_000
}

fn default_connector_timeout_ms() -> u64 {
    10_000
}

fn default_command_prefix() -> char {
    '/'
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            endpoint: default_backend_endpoint(),
            timeout_ms: default_backend_timeout_ms(),
            health_timeout_ms: default_backend_health_timeout_ms(),
            headers: HashMap::new(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_type: None,
            tenant_id: None,
            app_password: None,
            connector_token: None,
            token_endpoint: None,
            connector_timeout_ms: default_connector_timeout_ms(),
            command_prefix: default_command_prefix(),
        }
    }
}

impl BackendConfig {
    /// Full chat URL: `endpoint` as-is when absolute, otherwise joined to `base_url`.
    pub fn chat_url(&self) -> String {
        let endpoint = self.endpoint.trim();
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let base = self.base_url.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return base.to_string();
        }
        format!("{}/{}", base, endpoint.trim_start_matches('/'))
    }

    /// Health probe URL (`{base_url}/health`).
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url.trim().trim_end_matches('/'))
    }
}

/// Read an env var, ignoring unset, empty, and whitespace-only values.
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Apply environment overrides through the given lookup. Split out so tests need not touch the process env.
fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("BACKEND_SERVICE_URL") {
        config.backend.base_url = v;
    }
    if let Some(v) = lookup("BOT_ENDPOINT") {
        config.backend.endpoint = v;
    }
    if let Some(v) = lookup("CLIENT_ID") {
        config.bot.app_id = Some(v);
    }
    if let Some(v) = lookup("BOT_TYPE") {
        config.bot.app_type = Some(v);
    }
    if let Some(v) = lookup("TENANT_ID") {
        config.bot.tenant_id = Some(v);
    }
    if let Some(v) = lookup("CLIENT_PASSWORD") {
        config.bot.app_password = Some(v);
    }
    if let Some(v) = lookup("BOT_CONNECTOR_TOKEN") {
        config.bot.connector_token = Some(v);
    }
}

/// Apply environment overrides (BACKEND_SERVICE_URL, BOT_ENDPOINT, CLIENT_ID, BOT_TYPE, TENANT_ID,
/// CLIENT_PASSWORD, BOT_CONNECTOR_TOKEN) on top of the file config.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, env_non_empty);
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("DESKBOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".deskbot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default / DESKBOT_CONFIG_PATH), then apply env overrides.
/// Missing file => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    apply_env_overrides(&mut config);
    Ok((config, path))
}

const REDACTED: &str = "[redacted]";

/// Copy of the config with credentials and backend header values masked, safe to log or print.
pub fn redacted(config: &Config) -> Config {
    let mut out = config.clone();
    if out.bot.app_password.is_some() {
        out.bot.app_password = Some(REDACTED.to_string());
    }
    if out.bot.connector_token.is_some() {
        out.bot.connector_token = Some(REDACTED.to_string());
    }
    for value in out.backend.headers.values_mut() {
        *value = REDACTED.to_string();
    }
    out
}
