//! Message processor: routes one inbound activity through a fixed precedence chain.
//!
//! 1. card action with a registered handler that reports handled
//! 2. command (mention-stripped text starting with the prefix, registered token)
//! 3. first message handler whose predicate accepts
//! 4. backend call, with the typed response rendered as incident notice, KB card, or echo
//!
//! The first path that handles the activity ends the turn.

use crate::backend::{BackendResponse, BackendResponseData, ChatBackend, MessageData};
use crate::cards::{articles_from_results, send_kb_card};
use crate::commands::{parse_command, CommandRegistry};
use crate::context::TurnContext;
use crate::error::BotError;
use crate::handlers::{send_incident_notice, ActionHandler, ActionRegistry, MessageHandler};
use crate::storage::ConversationStore;
use std::sync::Arc;

const GENERIC_APOLOGY: &str = "Sorry, I encountered an error processing your message.";
const KB_RENDER_APOLOGY: &str =
    "I found some knowledge base articles, but encountered an error displaying them.";

/// Which path handled an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Action,
    Command,
    Handler,
    Backend,
}

pub struct MessageProcessor {
    backend: Arc<dyn ChatBackend>,
    commands: CommandRegistry,
    store: ConversationStore,
    actions: ActionRegistry,
    message_handlers: Vec<Arc<dyn MessageHandler>>,
    command_prefix: char,
}

impl MessageProcessor {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        commands: CommandRegistry,
        store: ConversationStore,
    ) -> Self {
        Self {
            backend,
            commands,
            store,
            actions: ActionRegistry::new(),
            message_handlers: Vec::new(),
            command_prefix: '/',
        }
    }

    pub fn with_command_prefix(mut self, prefix: char) -> Self {
        self.command_prefix = prefix;
        self
    }

    pub fn register_action_handler(&mut self, handler: Arc<dyn ActionHandler>) {
        self.actions.register(handler);
    }

    /// Append to the handler chain; handlers are consulted in registration order.
    pub fn register_message_handler(&mut self, handler: Arc<dyn MessageHandler>) {
        self.message_handlers.push(handler);
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Top-level entry for the host: process the activity and turn any error into a generic
    /// apology. Nothing escapes to the transport.
    pub async fn handle_activity(&self, ctx: &dyn TurnContext) {
        if let Err(e) = self.process(ctx).await {
            log::error!(
                "processor: error processing activity in conversation {}: {}",
                ctx.activity().conversation.id,
                e
            );
            if let Err(e) = ctx.send(GENERIC_APOLOGY.into()).await {
                log::error!("processor: failed to send apology: {}", e);
            }
        }
    }

    /// Route one activity. Returns the path that handled it.
    pub async fn process(&self, ctx: &dyn TurnContext) -> Result<Route, BotError> {
        let activity = ctx.activity();

        if let Some(payload) = activity.value.as_ref().filter(|_| activity.action().is_some()) {
            if self.actions.handle(ctx, payload).await? {
                return Ok(Route::Action);
            }
        }

        let text = activity.strip_mentions_text();

        if let Some((command, args)) = parse_command(&text, self.command_prefix) {
            if self.commands.execute(&command, ctx, &args).await? {
                return Ok(Route::Command);
            }
        }

        for handler in &self.message_handlers {
            if handler.can_handle(ctx).await {
                handler.handle(ctx).await?;
                return Ok(Route::Handler);
            }
        }

        self.process_backend_message(ctx, &text).await?;
        Ok(Route::Backend)
    }

    async fn process_backend_message(
        &self,
        ctx: &dyn TurnContext,
        text: &str,
    ) -> Result<(), BotError> {
        let message = MessageData::from_activity(ctx.activity(), text);
        let data = match self.backend.send_chat_message(&message).await {
            BackendResponse::Success { data: Some(data) } => data,
            BackendResponse::Success { data: None } => {
                log::error!("processor: backend response had no payload");
                return self.handle_default_echo(ctx, text).await;
            }
            BackendResponse::Failure { message, .. } => {
                log::error!("processor: backend call failed: {}", message);
                return self.handle_default_echo(ctx, text).await;
            }
        };

        match BackendResponseData::from_value(&data) {
            BackendResponseData::IncidentCreated { sys_id, url } => {
                send_incident_notice(ctx, &sys_id, &url).await
            }
            BackendResponseData::KbSuggestions {
                results: Some(results),
            } => {
                let articles = articles_from_results(&results);
                log::debug!("processor: {} kb suggestion(s)", articles.len());
                if let Err(e) = send_kb_card(ctx, &articles).await {
                    log::error!("processor: failed to send kb suggestions card: {}", e);
                    ctx.send(KB_RENDER_APOLOGY.into()).await?;
                }
                Ok(())
            }
            BackendResponseData::KbSuggestions { results: None } | BackendResponseData::Unknown => {
                self.handle_default_echo(ctx, text).await
            }
        }
    }

    /// Bump the conversation counter and echo the text back with it.
    async fn handle_default_echo(&self, ctx: &dyn TurnContext, text: &str) -> Result<(), BotError> {
        let conversation_id = &ctx.activity().conversation.id;
        let mut state = self.store.get_state(conversation_id).await;
        state.count += 1;
        self.store.set_state(conversation_id, &state).await;
        ctx.send(format!("[{}] you said: {}", state.count, text).into())
            .await
    }
}
