//! Pluggable handlers: card actions and generic message handlers.
//!
//! Action handlers are keyed by the `action` tag of a card submission. Message handlers form an
//! ordered chain consulted after commands and before the backend.

mod article;
mod incident;

pub use article::ArticleSelectionHandler;
pub use incident::send_incident_notice;

use crate::context::TurnContext;
use crate::error::BotError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Handles one kind of card submission.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The `action` tag this handler owns (e.g. "select_article").
    fn action_type(&self) -> &str;

    /// Handle the submission. `Ok(false)` means "not handled"; the pipeline then falls through to
    /// text handling.
    async fn handle(&self, ctx: &dyn TurnContext, payload: &Value) -> Result<bool, BotError>;
}

/// Generic predicate/handler pair. The first handler whose `can_handle` accepts owns the turn.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn can_handle(&self, ctx: &dyn TurnContext) -> bool;

    async fn handle(&self, ctx: &dyn TurnContext) -> Result<(), BotError>;
}

/// Action handlers by action tag. Registering a tag again replaces the earlier handler.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers
            .insert(handler.action_type().to_string(), handler);
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action_type).cloned()
    }

    /// Registered action tags, sorted.
    pub fn action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Dispatch a submission payload by its `action` field. Unregistered or missing tags report
    /// `Ok(false)` without side effects.
    pub async fn handle(&self, ctx: &dyn TurnContext, payload: &Value) -> Result<bool, BotError> {
        let Some(action) = payload.get("action").and_then(|a| a.as_str()) else {
            return Ok(false);
        };
        match self.handlers.get(action) {
            Some(handler) => handler.handle(ctx, payload).await,
            None => {
                log::debug!("actions: no handler for {}", action);
                Ok(false)
            }
        }
    }
}
