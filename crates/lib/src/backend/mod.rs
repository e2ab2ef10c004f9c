//! Backend chat service: client, wire types, and the typed response payload.

mod client;
mod types;

pub use client::{BackendClient, ChatBackend};
pub use types::{BackendResponse, BackendResponseData, KbResult, MessageData, UserInfo};

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns a fixed response and records the text of every message it receives.
    pub struct ScriptedBackend {
        response: BackendResponse,
        pub received: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub fn new(response: BackendResponse) -> Self {
            Self {
                response,
                received: Mutex::new(Vec::new()),
            }
        }

        pub fn ok(data: serde_json::Value) -> Self {
            Self::new(BackendResponse::Success { data: Some(data) })
        }

        pub fn timeout() -> Self {
            Self::new(BackendResponse::failure("No response from backend service"))
        }

        pub fn received(&self) -> Vec<String> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn send_chat_message(&self, message: &MessageData) -> BackendResponse {
            self.received.lock().unwrap().push(message.text.clone());
            self.response.clone()
        }

        async fn health_check(&self) -> bool {
            true
        }
    }
}
