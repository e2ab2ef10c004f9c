//! Slash commands: registry, tokenization, and the built-in commands.

use crate::context::TurnContext;
use crate::error::BotError;
use crate::storage::ConversationStore;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// One command, keyed by its bare name (e.g. "reset"). The prefix that marks a message as a
/// command is configured on the processor, not on the handler.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn command(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    async fn handle(&self, ctx: &dyn TurnContext, args: &[String]) -> Result<(), BotError>;
}

/// Split command text into the command name (first whitespace-delimited token, prefix removed)
/// and the remaining arguments. None unless the text starts with `prefix` followed by a name.
pub fn parse_command(text: &str, prefix: char) -> Option<(String, Vec<String>)> {
    let rest = text.trim_start().strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        return None;
    }
    let mut parts = rest.split_whitespace();
    let command = parts.next()?.to_string();
    Some((command, parts.map(str::to_string).collect()))
}

/// Command handlers by name. Registering a name again replaces the earlier handler.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(handler.command().to_string(), handler);
    }

    pub fn register_all(&mut self, handlers: impl IntoIterator<Item = Arc<dyn CommandHandler>>) {
        for handler in handlers {
            self.register(handler);
        }
    }

    pub fn get_handler(&self, command: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(command).cloned()
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Registered commands with their descriptions, sorted by name.
    pub fn commands(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .handlers
            .values()
            .map(|h| (h.command().to_string(), h.description().to_string()))
            .collect();
        out.sort();
        out
    }

    /// Run the handler for `command`. `Ok(false)` (and no side effects) when it is not registered.
    pub async fn execute(
        &self,
        command: &str,
        ctx: &dyn TurnContext,
        args: &[String],
    ) -> Result<bool, BotError> {
        let Some(handler) = self.handlers.get(command) else {
            return Ok(false);
        };
        log::debug!("commands: running {}", command);
        handler.handle(ctx, args).await?;
        Ok(true)
    }
}

/// `/reset`: delete the conversation state.
struct ResetCommand {
    store: ConversationStore,
}

#[async_trait]
impl CommandHandler for ResetCommand {
    fn command(&self) -> &str {
        "reset"
    }

    fn description(&self) -> &str {
        "Reset conversation state"
    }

    async fn handle(&self, ctx: &dyn TurnContext, _args: &[String]) -> Result<(), BotError> {
        self.store
            .delete_state(&ctx.activity().conversation.id)
            .await;
        ctx.send("Ok I've deleted the current conversation state.".into())
            .await
    }
}

/// `/count`: report the echo counter.
struct CountCommand {
    store: ConversationStore,
}

#[async_trait]
impl CommandHandler for CountCommand {
    fn command(&self) -> &str {
        "count"
    }

    fn description(&self) -> &str {
        "Get conversation count"
    }

    async fn handle(&self, ctx: &dyn TurnContext, _args: &[String]) -> Result<(), BotError> {
        let state = self.store.get_state(&ctx.activity().conversation.id).await;
        ctx.send(format!("The count is {}", state.count).into())
            .await
    }
}

/// `/diag`: dump the raw activity.
struct DiagCommand;

#[async_trait]
impl CommandHandler for DiagCommand {
    fn command(&self) -> &str {
        "diag"
    }

    fn description(&self) -> &str {
        "Show diagnostic information"
    }

    async fn handle(&self, ctx: &dyn TurnContext, _args: &[String]) -> Result<(), BotError> {
        let raw = serde_json::to_string(ctx.activity())?;
        ctx.send(raw.into()).await
    }
}

/// `/state`: dump the full conversation state.
struct StateCommand {
    store: ConversationStore,
}

#[async_trait]
impl CommandHandler for StateCommand {
    fn command(&self) -> &str {
        "state"
    }

    fn description(&self) -> &str {
        "Show conversation state"
    }

    async fn handle(&self, ctx: &dyn TurnContext, _args: &[String]) -> Result<(), BotError> {
        let state = self.store.get_state(&ctx.activity().conversation.id).await;
        ctx.send(serde_json::to_string(&state)?.into()).await
    }
}

/// `/runtime`: version and platform.
struct RuntimeCommand;

#[async_trait]
impl CommandHandler for RuntimeCommand {
    fn command(&self) -> &str {
        "runtime"
    }

    fn description(&self) -> &str {
        "Show runtime information"
    }

    async fn handle(&self, ctx: &dyn TurnContext, _args: &[String]) -> Result<(), BotError> {
        let runtime = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        });
        ctx.send(runtime.to_string().into()).await
    }
}

/// Built-in commands: `/reset`, `/count`, `/diag`, `/state`, `/runtime`.
pub fn default_commands(store: &ConversationStore) -> Vec<Arc<dyn CommandHandler>> {
    vec![
        Arc::new(ResetCommand {
            store: store.clone(),
        }),
        Arc::new(CountCommand {
            store: store.clone(),
        }),
        Arc::new(DiagCommand),
        Arc::new(StateCommand {
            store: store.clone(),
        }),
        Arc::new(RuntimeCommand),
    ]
}
