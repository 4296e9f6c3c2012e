//! Webhook ingress: Telegram pushes updates, each one is dispatched inline.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use roster_engine::Engine;

use crate::telegram_types::TelegramUpdate;
use crate::telegram_update::inbound_event_from_update;

pub const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
pub const WEBHOOK_PATH: &str = "/webhook";

#[derive(Debug, Clone)]
pub struct TelegramWebhookConfig {
    pub bind: String,
    /// Expected value of the secret header; `None` accepts any caller.
    pub secret_token: Option<String>,
}

impl Default for TelegramWebhookConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            secret_token: None,
        }
    }
}

struct WebhookState {
    engine: Arc<Engine>,
    secret_token: Option<String>,
}

pub fn build_webhook_router(engine: Arc<Engine>, secret_token: Option<String>) -> Router {
    let secret_token = secret_token
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    Router::new()
        .route(WEBHOOK_PATH, post(handle_telegram_update))
        .route("/healthz", get(handle_health))
        .with_state(Arc::new(WebhookState {
            engine,
            secret_token,
        }))
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status":"ok"})))
}

async fn handle_telegram_update(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    if let Some(expected) = state.secret_token.as_deref() {
        let observed = headers
            .get(TELEGRAM_SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or("");
        if observed != expected {
            warn!("telegram webhook secret mismatch");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error":{"code":"auth_failed","message":"invalid telegram webhook secret"}})),
            );
        }
    }

    let update = match serde_json::from_str::<TelegramUpdate>(&body) {
        Ok(update) => update,
        Err(error) => {
            warn!(%error, "undecodable telegram update");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error":{"code":"parse_failed","message":error.to_string()}})),
            );
        }
    };

    let Some(event) = inbound_event_from_update(&update) else {
        debug!(update_id = update.update_id, "ignoring unsupported telegram update");
        return (
            StatusCode::OK,
            Json(json!({"status":"ignored","update_id":update.update_id})),
        );
    };
    let outcome = state.engine.dispatch(event).await;
    (
        StatusCode::OK,
        Json(json!({"status":"accepted","update_id":update.update_id,"outcome":outcome})),
    )
}

/// Serves the webhook until ctrl-c.
pub async fn run_telegram_webhook_server(
    engine: Arc<Engine>,
    config: TelegramWebhookConfig,
) -> Result<()> {
    let listener = TcpListener::bind(config.bind.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve webhook bound address")?;
    info!(
        addr = %local_addr,
        path = WEBHOOK_PATH,
        secret_configured = config.secret_token.is_some(),
        "telegram webhook server listening"
    );
    let app = build_webhook_router(engine, config.secret_token);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("telegram webhook server exited unexpectedly")?;
    info!("telegram webhook server stopped");
    Ok(())
}
