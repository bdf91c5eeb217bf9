use std::sync::Arc;

use {
    axum::{
        Extension, Json,
        extract::{Path, State},
    },
    serde::Serialize,
    tracing::info,
};

use botdesk_store::{Bot, BotPatch, NewBot};

use crate::{
    auth::{CurrentAgent, require_super_admin},
    error::{ApiError, ApiResult},
    state::GatewayState,
};

/// Bot row plus its live runtime status.
#[derive(Debug, Serialize)]
pub struct BotView {
    #[serde(flatten)]
    pub bot: Bot,
    pub is_running: bool,
}

async fn view(state: &GatewayState, bot: Bot) -> BotView {
    let is_running = state.registry.is_running(&bot.id).await;
    BotView { bot, is_running }
}

pub async fn list_bots(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
) -> ApiResult<Json<Vec<BotView>>> {
    require_super_admin(&agent)?;
    let bots = state.store.list_bots().await?;
    let mut views = Vec::with_capacity(bots.len());
    for bot in bots {
        views.push(view(&state, bot).await);
    }
    Ok(Json(views))
}

pub async fn get_bot(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(id): Path<String>,
) -> ApiResult<Json<BotView>> {
    require_super_admin(&agent)?;
    let bot = state
        .store
        .bot(&id)
        .await?
        .ok_or(ApiError::NotFound("bot"))?;
    Ok(Json(view(&state, bot).await))
}

/// Creating an active bot brings it online immediately and registers its
/// webhook with Telegram.
pub async fn create_bot(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Json(body): Json<NewBot>,
) -> ApiResult<Json<BotView>> {
    require_super_admin(&agent)?;
    let bot = state.store.create_bot(body).await?;
    info!(bot_id = %bot.id, name = %bot.display_name, "bot created");
    if bot.is_active {
        state.registry.start_bot(&bot).await;
        state.registry.factory().register_webhook(&bot).await;
    }
    Ok(Json(view(&state, bot).await))
}

/// A token change restarts the bot so the new token takes effect; webhook
/// registration is refreshed on any restart.
pub async fn update_bot(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(id): Path<String>,
    Json(patch): Json<BotPatch>,
) -> ApiResult<Json<BotView>> {
    require_super_admin(&agent)?;
    let token_changed = patch.secret_token.is_some();
    let active_changed = patch.is_active;
    let bot = state.store.update_bot(&id, patch).await?;

    if token_changed {
        // Restart re-reads the row, so this also honors an is_active change
        // arriving in the same patch.
        state.registry.restart_bot(&bot.id).await?;
    } else {
        match active_changed {
            Some(true) => state.registry.start_bot(&bot).await,
            Some(false) => state.registry.stop_bot(&bot.id).await,
            None => {}
        }
    }
    if bot.is_active && state.registry.is_running(&bot.id).await {
        state.registry.factory().register_webhook(&bot).await;
    }
    Ok(Json(view(&state, bot).await))
}

/// Flip `is_active` and drive the runtime to match.
pub async fn toggle_bot(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(id): Path<String>,
) -> ApiResult<Json<BotView>> {
    require_super_admin(&agent)?;
    let bot = state
        .store
        .bot(&id)
        .await?
        .ok_or(ApiError::NotFound("bot"))?;
    let bot = state
        .store
        .update_bot(
            &id,
            BotPatch {
                is_active: Some(!bot.is_active),
                ..BotPatch::default()
            },
        )
        .await?;
    if bot.is_active {
        state.registry.start_bot(&bot).await;
        state.registry.factory().register_webhook(&bot).await;
    } else {
        state.registry.stop_bot(&bot.id).await;
    }
    info!(bot_id = %bot.id, is_active = bot.is_active, "bot toggled");
    Ok(Json(view(&state, bot).await))
}

/// Stops the runtime first so no webhook races the cascade delete.
pub async fn delete_bot(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    require_super_admin(&agent)?;
    state.registry.stop_bot(&id).await;
    state.store.delete_bot(&id).await?;
    info!(bot_id = %id, "bot deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}
