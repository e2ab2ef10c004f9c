//! Wiring: builds storage, backend client, registries, and the processor from config.

use crate::backend::{BackendClient, ChatBackend};
use crate::commands::{default_commands, CommandRegistry};
use crate::config::Config;
use crate::handlers::ArticleSelectionHandler;
use crate::pipeline::MessageProcessor;
use crate::storage::{ConversationStore, FileStorage, KeyValueStore, MemoryStorage};
use std::sync::Arc;

/// Everything the host needs to serve a conversation.
#[derive(Clone)]
pub struct Bot {
    pub processor: Arc<MessageProcessor>,
    pub backend: Arc<dyn ChatBackend>,
    pub store: ConversationStore,
}

/// Storage named by `storage.path`, or in-memory when unset.
pub async fn build_storage(config: &Config) -> Arc<dyn KeyValueStore> {
    match config.storage.path {
        Some(ref path) => {
            log::info!("conversation state persisted to {}", path.display());
            Arc::new(FileStorage::load(path).await)
        }
        None => {
            log::info!("conversation state kept in memory");
            Arc::new(MemoryStorage::new())
        }
    }
}

/// Build the bot against the configured backend.
pub async fn build_bot(config: &Config) -> Bot {
    let backend: Arc<dyn ChatBackend> = Arc::new(BackendClient::new(&config.backend));
    build_bot_with_backend(config, backend).await
}

/// Build the bot with a given backend (for alternative transports and tests).
pub async fn build_bot_with_backend(config: &Config, backend: Arc<dyn ChatBackend>) -> Bot {
    let store = ConversationStore::new(build_storage(config).await);

    let mut commands = CommandRegistry::new();
    commands.register_all(default_commands(&store));

    let mut processor = MessageProcessor::new(backend.clone(), commands, store.clone())
        .with_command_prefix(config.bot.command_prefix);
    processor.register_action_handler(Arc::new(ArticleSelectionHandler::new(backend.clone())));

    Bot {
        processor: Arc::new(processor),
        backend,
        store,
    }
}
