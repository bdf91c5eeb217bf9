use std::sync::Arc;

use {
    axum::{Json, extract::{Path, State}},
    serde::Serialize,
};

use botdesk_registry::RouteOutcome;

use crate::state::GatewayState;

/// In-band webhook acknowledgement. The handler always answers 200:
/// Telegram retries deliveries aggressively on any other status, and a
/// payload that failed once will fail every retry.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /api/telegram/webhook/{bot_id}` — unauthenticated entry point for
/// Telegram's webhook delivery.
pub async fn webhook_handler(
    State(state): State<Arc<GatewayState>>,
    Path(bot_id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Json<WebhookAck> {
    let ack = match state.registry.route(&bot_id, payload).await {
        RouteOutcome::Handled | RouteOutcome::Ignored => WebhookAck {
            ok: true,
            message: None,
        },
        RouteOutcome::NotRunning => WebhookAck {
            ok: false,
            message: Some("bot is not running".to_string()),
        },
        RouteOutcome::Failed(reason) => WebhookAck {
            ok: false,
            message: Some(reason),
        },
    };
    Json(ack)
}
