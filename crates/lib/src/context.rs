//! Per-turn context handed to every handler: the inbound activity and a way to reply.

use crate::activity::{Activity, OutboundMessage};
use crate::error::BotError;
use async_trait::async_trait;

/// One turn of a conversation. Implemented by the host transport; the pipeline only reads the
/// activity and sends replies.
#[async_trait]
pub trait TurnContext: Send + Sync {
    fn activity(&self) -> &Activity;

    /// Send a reply into the conversation the activity came from.
    async fn send(&self, message: OutboundMessage) -> Result<(), BotError>;
}
