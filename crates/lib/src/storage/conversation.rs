//! Conversation state keyed by conversation id.
//!
//! Read-modify-write sequences (`get_state` → mutate → `set_state`, and the property helpers) are
//! not atomic: two turns on the same conversation can race and the last write wins.

use super::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Per-conversation record: the echo counter plus free-form extension fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Owns every `ConversationState`; nothing else writes them.
#[derive(Clone)]
pub struct ConversationStore {
    storage: Arc<dyn KeyValueStore>,
}

impl ConversationStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// State for the conversation. A missing (or unreadable) entry is replaced by the default
    /// `{count: 0}`, which is persisted before it is returned.
    pub async fn get_state(&self, conversation_id: &str) -> ConversationState {
        if let Some(value) = self.storage.get(conversation_id).await {
            match serde_json::from_value::<ConversationState>(value) {
                Ok(state) => return state,
                Err(e) => {
                    log::warn!(
                        "storage: unreadable state for conversation {}, resetting: {}",
                        conversation_id,
                        e
                    );
                }
            }
        }
        let state = ConversationState::default();
        self.set_state(conversation_id, &state).await;
        state
    }

    /// Overwrite the stored state.
    pub async fn set_state(&self, conversation_id: &str, state: &ConversationState) {
        match serde_json::to_value(state) {
            Ok(value) => self.storage.set(conversation_id, value).await,
            Err(e) => log::warn!("storage: failed to encode state: {}", e),
        }
    }

    /// Remove the entry; the next `get_state` recreates the default.
    pub async fn delete_state(&self, conversation_id: &str) {
        self.storage.delete(conversation_id).await;
    }

    /// Read one field of the state (including `count`). None when absent or of another type.
    pub async fn get_property<T: DeserializeOwned>(
        &self,
        conversation_id: &str,
        key: &str,
    ) -> Option<T> {
        let state = self.get_state(conversation_id).await;
        let mut fields = match serde_json::to_value(state) {
            Ok(Value::Object(fields)) => fields,
            _ => return None,
        };
        fields
            .remove(key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Write one field of the state. A value that would make the record invalid (e.g. a
    /// non-numeric `count`) is rejected and logged.
    pub async fn set_property<T: Serialize>(&self, conversation_id: &str, key: &str, value: T) {
        let state = self.get_state(conversation_id).await;
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("storage: failed to encode property {}: {}", key, e);
                return;
            }
        };
        let mut fields = match serde_json::to_value(state) {
            Ok(Value::Object(fields)) => fields,
            _ => return,
        };
        fields.insert(key.to_string(), value);
        match serde_json::from_value::<ConversationState>(Value::Object(fields)) {
            Ok(updated) => self.set_state(conversation_id, &updated).await,
            Err(e) => log::warn!("storage: rejected property {}: {}", key, e),
        }
    }
}
