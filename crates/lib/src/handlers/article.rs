//! `select_article` action: the user picked an article from the suggestion card.

use super::ActionHandler;
use crate::backend::{ChatBackend, MessageData};
use crate::cards::SELECT_ARTICLE_ACTION;
use crate::context::TurnContext;
use crate::error::BotError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const CONFIRMATION: &str = "Marked as resolved. Thanks!";
const FAILURE_NOTICE: &str =
    "❌ Sorry, I encountered an error while marking the article. Please try again.";

/// Forwards the chosen article id to the backend as a message and confirms to the user.
pub struct ArticleSelectionHandler {
    backend: Arc<dyn ChatBackend>,
}

impl ArticleSelectionHandler {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }
}

/// `articleId` as a string; numeric ids are accepted too.
fn article_id(payload: &Value) -> Option<String> {
    match payload.get("articleId")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl ActionHandler for ArticleSelectionHandler {
    fn action_type(&self) -> &str {
        SELECT_ARTICLE_ACTION
    }

    async fn handle(&self, ctx: &dyn TurnContext, payload: &Value) -> Result<bool, BotError> {
        let Some(article_id) = article_id(payload) else {
            return Ok(false);
        };
        let message = MessageData::from_activity(ctx.activity(), article_id.clone());
        log::info!(
            "article: sending selection {} for conversation {} to backend",
            article_id,
            message.conversation_id
        );
        let result = self.backend.send_chat_message(&message).await;
        if !result.is_success() {
            log::warn!("article: backend did not accept selection: {:?}", result);
        }

        if let Err(e) = ctx.send(CONFIRMATION.into()).await {
            log::error!("article: failed to send confirmation: {}", e);
            ctx.send(FAILURE_NOTICE.into()).await?;
        }
        Ok(true)
    }
}
