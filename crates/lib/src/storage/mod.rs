//! Conversation state storage.
//!
//! A small key-value abstraction (`KeyValueStore`) with in-memory and JSON-file backends, and the
//! `ConversationStore` that maps a conversation id to its `ConversationState` on top of it.

mod conversation;
mod file;
mod memory;

pub use conversation::{ConversationState, ConversationStore};
pub use file::FileStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde_json::Value;

/// Key-value store supplied by the host. Absent keys are normal; there are no error conditions.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value);
    async fn delete(&self, key: &str);
}
