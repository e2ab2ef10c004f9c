//! Backend request/response types.

use crate::activity::Activity;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One inbound free-text message, as handed to the backend client. Only `text` goes on the wire;
/// the rest is local context.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    pub conversation_id: String,
    pub message_id: String,
    pub text: String,
    /// RFC 3339 time the message was built.
    pub timestamp: String,
    pub user: UserInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip)]
    pub activity: Option<Activity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
}

impl MessageData {
    /// Build from an activity with the given (already mention-stripped) text.
    pub fn from_activity(activity: &Activity, text: impl Into<String>) -> Self {
        Self {
            conversation_id: activity.conversation.id.clone(),
            message_id: activity.id.clone().unwrap_or_default(),
            text: text.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            user: UserInfo {
                id: activity.from.id.clone(),
                name: activity
                    .from
                    .name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
            },
            channel_id: activity.channel_id.clone(),
            activity: Some(activity.clone()),
        }
    }
}

/// Wire body of a chat call: `{ "message": <text> }`.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
}

/// Outcome of one backend call. Transport problems are values, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendResponse {
    Success {
        data: Option<Value>,
    },
    Failure {
        message: String,
        /// Raw error body when the backend answered with an error status.
        data: Option<Value>,
    },
}

impl BackendResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        BackendResponse::Failure {
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BackendResponse::Success { .. })
    }

    /// Payload of a successful call, if any.
    pub fn data(&self) -> Option<&Value> {
        match self {
            BackendResponse::Success { data } => data.as_ref(),
            BackendResponse::Failure { .. } => None,
        }
    }
}

/// Typed view of a successful payload, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendResponseData {
    IncidentCreated {
        #[serde(default, deserialize_with = "lenient_string")]
        sys_id: String,
        #[serde(default, deserialize_with = "lenient_string")]
        url: String,
    },
    KbSuggestions {
        #[serde(default)]
        results: Option<Vec<KbResult>>,
    },
    /// Any other tag, or a payload that does not fit a known one.
    #[serde(other)]
    Unknown,
}

/// One knowledge-base search hit as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct KbResult {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub sys_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub summary: Option<String>,
}

/// Scalars as text; null, arrays, and objects as None.
fn scalar_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(scalar_string(Value::deserialize(d)?).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_string(Value::deserialize(d)?))
}

impl BackendResponseData {
    pub fn from_value(value: &Value) -> Self {
        match BackendResponseData::deserialize(value) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("backend: unrecognized response payload: {}", e);
                BackendResponseData::Unknown
            }
        }
    }
}
