//! Errors raised inside the dispatch pipeline.

/// Failure while handling one activity. Caught by the processor's top-level guard.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("send failed: {0}")]
    Send(String),
    #[error("handler failed: {0}")]
    Handler(String),
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
