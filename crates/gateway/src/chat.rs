use std::sync::Arc;

use {
    axum::{
        Extension, Json,
        extract::{Path, Query, State},
    },
    serde::Deserialize,
};

use botdesk_store::{ChatStats, MessagePage, MessageRecord, UserOverview};

use crate::{
    access::{accessible_bot_ids, verify_bot_access},
    auth::CurrentAgent,
    error::{ApiError, ApiResult},
    state::GatewayState,
};

/// `GET /api/chat/users` — conversation sidebar, scoped to the agent's bots.
pub async fn list_users(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
) -> ApiResult<Json<Vec<UserOverview>>> {
    let bot_ids = accessible_bot_ids(&state, &agent).await?;
    Ok(Json(state.store.list_users_overview(&bot_ids).await?))
}

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

/// `GET /api/chat/users/{user_id}/messages` — newest page first, messages
/// oldest-first within the page.
pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(user_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<MessagePage>> {
    let user = state
        .store
        .end_user(&user_id)
        .await?
        .ok_or(ApiError::NotFound("end user"))?;
    verify_bot_access(&state, &agent, &user.bot_id).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * limit;
    let search = query.search.as_deref().filter(|s| !s.is_empty());

    let messages = state
        .store
        .messages_for_user(&user.id, &user.bot_id, limit, offset, search)
        .await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    pub content: String,
    #[serde(default)]
    pub photo_ref: Option<String>,
}

/// `POST /api/chat/users/{user_id}/reply` — send through the bot, persist on
/// transport success.
pub async fn reply(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(user_id): Path<String>,
    Json(body): Json<ReplyBody>,
) -> ApiResult<Json<MessageRecord>> {
    if body.content.is_empty() && body.photo_ref.is_none() {
        return Err(ApiError::BadRequest("empty reply".to_string()));
    }
    let user = state
        .store
        .end_user(&user_id)
        .await?
        .ok_or(ApiError::NotFound("end user"))?;
    verify_bot_access(&state, &agent, &user.bot_id).await?;

    let message = state
        .registry
        .send_to_end_user(&user.bot_id, &user.id, body.content, body.photo_ref)
        .await?;
    Ok(Json(message))
}

/// `POST /api/chat/messages/{id}/read`
pub async fn mark_message_read(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(message_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let message = state
        .store
        .message(&message_id)
        .await?
        .ok_or(ApiError::NotFound("message"))?;
    verify_bot_access(&state, &agent, &message.bot_id).await?;
    state.store.mark_message_read(&message_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/chat/users/{user_id}/read` — clear a whole conversation's
/// unread counter.
pub async fn mark_user_read(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = state
        .store
        .end_user(&user_id)
        .await?
        .ok_or(ApiError::NotFound("end user"))?;
    verify_bot_access(&state, &agent, &user.bot_id).await?;
    state
        .store
        .mark_user_messages_read(&user.id, &user.bot_id)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `GET /api/chat/stats` — aggregate counters over the agent's bots.
pub async fn stats(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
) -> ApiResult<Json<ChatStats>> {
    let bot_ids = accessible_bot_ids(&state, &agent).await?;
    Ok(Json(state.store.chat_stats(&bot_ids).await?))
}
