use std::sync::Arc;

use {
    axum::{
        Extension, Json,
        extract::{Path, State},
    },
    serde::Deserialize,
    tracing::info,
};

use botdesk_store::{Agent, AgentPatch, Assignment, NewAgent, NewAssignment};

use crate::{
    auth::{CurrentAgent, require_super_admin},
    error::{ApiError, ApiResult},
    state::GatewayState,
};

pub async fn list_agents(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
) -> ApiResult<Json<Vec<Agent>>> {
    require_super_admin(&agent)?;
    Ok(Json(state.store.list_agents().await?))
}

pub async fn create_agent(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Json(body): Json<NewAgent>,
) -> ApiResult<Json<Agent>> {
    require_super_admin(&agent)?;
    let created = state.store.create_agent(body).await?;
    info!(agent_id = %created.id, username = %created.username, "agent created");
    Ok(Json(created))
}

pub async fn get_agent(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(id): Path<String>,
) -> ApiResult<Json<Agent>> {
    require_super_admin(&agent)?;
    let found = state
        .store
        .agent(&id)
        .await?
        .ok_or(ApiError::NotFound("agent"))?;
    Ok(Json(found))
}

pub async fn update_agent(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(id): Path<String>,
    Json(patch): Json<AgentPatch>,
) -> ApiResult<Json<Agent>> {
    require_super_admin(&agent)?;
    Ok(Json(state.store.update_agent(&id, patch).await?))
}

/// Deleting an agent cascades to its assignments; conversations are
/// untouched since they belong to bots, not agents.
pub async fn delete_agent(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    require_super_admin(&agent)?;
    state.store.delete_agent(&id).await?;
    info!(agent_id = %id, "agent deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn create_assignment(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Json(body): Json<NewAssignment>,
) -> ApiResult<Json<Assignment>> {
    require_super_admin(&agent)?;
    let created = state.store.create_assignment(body).await?;
    info!(
        assignment_id = %created.id,
        bot_id = %created.bot_id,
        agent_id = %created.agent_id,
        "assignment created"
    );
    Ok(Json(created))
}

pub async fn assignments_for_bot(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(bot_id): Path<String>,
) -> ApiResult<Json<Vec<Assignment>>> {
    require_super_admin(&agent)?;
    Ok(Json(state.store.assignments_for_bot(&bot_id).await?))
}

pub async fn assignments_for_agent(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Vec<Assignment>>> {
    require_super_admin(&agent)?;
    Ok(Json(state.store.assignments_for_agent(&agent_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AssignmentPatch {
    pub telegram_notification_id: Option<String>,
}

pub async fn update_assignment(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(id): Path<String>,
    Json(patch): Json<AssignmentPatch>,
) -> ApiResult<Json<Assignment>> {
    require_super_admin(&agent)?;
    Ok(Json(
        state
            .store
            .update_assignment(&id, patch.telegram_notification_id)
            .await?,
    ))
}

pub async fn delete_assignment(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    require_super_admin(&agent)?;
    state.store.delete_assignment(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
