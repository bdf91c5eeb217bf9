use std::{collections::HashMap, sync::Arc};

use {
    async_trait::async_trait,
    axum::{
        extract::{Request, State},
        http::header,
        middleware::Next,
        response::Response,
    },
    tracing::debug,
};

use {
    botdesk_common::AgentRole,
    botdesk_store::{Agent, ConversationStore},
};

use crate::{error::ApiError, state::GatewayState};

/// Resolves a bearer token to the agent it belongs to. Token issuance and
/// password handling live in the external auth service; the gateway only
/// verifies.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Agent>;
}

/// Token table sourced from configuration, resolving to agent rows by
/// username. Suitable for single-node deployments and tests.
pub struct StaticTokenVerifier {
    store: Arc<dyn ConversationStore>,
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(store: Arc<dyn ConversationStore>, tokens: HashMap<String, String>) -> Self {
        Self { store, tokens }
    }
}

#[async_trait]
impl AuthVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Option<Agent> {
        let username = self.tokens.get(token)?;
        match self.store.agent_by_username(username).await {
            Ok(agent) => agent,
            Err(e) => {
                debug!(username, error = %e, "token lookup failed");
                None
            }
        }
    }
}

/// The authenticated agent, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentAgent(pub Agent);

impl CurrentAgent {
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.0.role == AgentRole::SuperAdmin
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Layer guarding the `/api` surface (webhook excepted): resolves the bearer
/// token and stashes the agent for handlers.
pub async fn require_auth(
    State(state): State<Arc<GatewayState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?;
    let agent = state
        .auth
        .verify(token)
        .await
        .ok_or(ApiError::Unauthorized)?;
    req.extensions_mut().insert(CurrentAgent(agent));
    Ok(next.run(req).await)
}

/// Guard for management routes restricted to super admins.
pub fn require_super_admin(agent: &CurrentAgent) -> Result<(), ApiError> {
    if agent.is_super_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
