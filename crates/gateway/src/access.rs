use crate::{auth::CurrentAgent, error::{ApiError, ApiResult}, state::GatewayState};

/// Super admins see every bot; admins only the bots they are assigned to.
/// A bot outside the agent's scope is a 403, not a 404: the bot's existence
/// is not secret, its conversations are.
pub async fn verify_bot_access(
    state: &GatewayState,
    agent: &CurrentAgent,
    bot_id: &str,
) -> ApiResult<()> {
    if agent.is_super_admin() {
        return Ok(());
    }
    let assignments = state.store.assignments_for_agent(&agent.0.id).await?;
    if assignments.iter().any(|a| a.bot_id == bot_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// The bot ids whose conversations this agent may read. For super admins
/// this is every registered bot.
pub async fn accessible_bot_ids(
    state: &GatewayState,
    agent: &CurrentAgent,
) -> ApiResult<Vec<String>> {
    if agent.is_super_admin() {
        let bots = state.store.list_bots().await?;
        Ok(bots.into_iter().map(|b| b.id).collect())
    } else {
        let assignments = state.store.assignments_for_agent(&agent.0.id).await?;
        Ok(assignments.into_iter().map(|a| a.bot_id).collect())
    }
}
