//! Messaging endpoint: receives activities over HTTP and runs them through the processor.

use crate::activity::Activity;
use crate::app::{self, Bot};
use crate::config::Config;
use crate::gateway::connector::{ConnectorClient, HttpTurnContext};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub bot: Bot,
    pub connector: Arc<ConnectorClient>,
}

impl ServerState {
    pub fn new(config: Config, bot: Bot) -> Self {
        let connector = Arc::new(ConnectorClient::from_config(&config.bot));
        Self {
            config: Arc::new(config),
            bot,
            connector,
        }
    }
}

/// Routes: `GET /` health, `POST /api/messages` activities.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/api/messages", post(messages))
        .with_state(state)
}

/// Run the messaging endpoint on config.server.bind:config.server.port until SIGINT/SIGTERM.
pub async fn run_server(config: Config) -> Result<()> {
    let bot = app::build_bot(&config).await;
    if bot.backend.health_check().await {
        log::info!("backend reachable at {}", config.backend.base_url);
    } else {
        log::warn!(
            "backend at {} did not pass its health check; messages will be echoed until it does",
            config.backend.base_url
        );
    }

    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let app = router(ServerState::new(config, bot));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("messaging endpoint listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited")?;
    log::info!("server stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining requests");
}

/// POST /api/messages: one activity per request. Message activities are processed; other types are
/// acknowledged and ignored. Body: `{ "replies": [...] }` with replies not sent via the connector.
async fn messages(State(state): State<ServerState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let activity: Activity = match serde_json::from_slice(&body) {
        Ok(a) => a,
        Err(e) => {
            log::debug!("rejecting malformed activity: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid activity" })),
            );
        }
    };
    if !activity.is_message() {
        log::debug!("ignoring {} activity", activity.typ);
        return (StatusCode::OK, Json(json!({ "replies": [] })));
    }
    log::info!(
        "received message in conversation {} from {}",
        activity.conversation.id,
        activity.from.id
    );

    let ctx = HttpTurnContext::new(
        activity,
        state.connector.clone(),
        state.config.bot.app_id.clone(),
    );
    state.bot.processor.handle_activity(&ctx).await;
    let replies = ctx.take_buffered().await;
    (StatusCode::OK, Json(json!({ "replies": replies })))
}

/// GET / returns a simple health JSON (for probes), including the backend probe result.
async fn health_http(State(state): State<ServerState>) -> Json<Value> {
    let backend = state.bot.backend.health_check().await;
    Json(json!({
        "runtime": "running",
        "port": state.config.server.port,
        "backend": backend,
    }))
}
