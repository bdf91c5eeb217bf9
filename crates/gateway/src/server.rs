use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Json, Router,
        extract::DefaultBodyLimit,
        middleware,
        routing::{get, post},
    },
    tower_http::{services::ServeDir, trace::TraceLayer},
    tracing::info,
};

use crate::{
    agents, auth::require_auth, bots, chat, state::GatewayState, uploads, webhook, ws,
};

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Assemble the full HTTP surface. The webhook, health check, and upload
/// serving stay outside the auth layer; everything else under `/api`
/// requires a bearer token.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let protected = Router::new()
        .route("/api/bots", get(bots::list_bots).post(bots::create_bot))
        .route(
            "/api/bots/{id}",
            get(bots::get_bot)
                .patch(bots::update_bot)
                .delete(bots::delete_bot),
        )
        .route("/api/bots/{id}/toggle", post(bots::toggle_bot))
        .route(
            "/api/bots/{bot_id}/assignments",
            get(agents::assignments_for_bot),
        )
        .route(
            "/api/agents",
            get(agents::list_agents).post(agents::create_agent),
        )
        .route(
            "/api/agents/{id}",
            get(agents::get_agent)
                .patch(agents::update_agent)
                .delete(agents::delete_agent),
        )
        .route(
            "/api/agents/{agent_id}/assignments",
            get(agents::assignments_for_agent),
        )
        .route("/api/assignments", post(agents::create_assignment))
        .route(
            "/api/assignments/{id}",
            axum::routing::patch(agents::update_assignment).delete(agents::delete_assignment),
        )
        .route("/api/chat/users", get(chat::list_users))
        .route("/api/chat/users/{user_id}/messages", get(chat::list_messages))
        .route("/api/chat/users/{user_id}/reply", post(chat::reply))
        .route("/api/chat/users/{user_id}/read", post(chat::mark_user_read))
        .route(
            "/api/chat/messages/{id}/read",
            post(chat::mark_message_read),
        )
        .route("/api/chat/stats", get(chat::stats))
        .route(
            "/api/uploads",
            post(uploads::upload_image)
                .layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_BYTES + 16 * 1024)),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws::ws_upgrade_handler))
        .route(
            "/api/telegram/webhook/{bot_id}",
            post(webhook::webhook_handler),
        )
        .merge(protected)
        .nest_service("/uploads", ServeDir::new(&state.uploads_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: Arc<GatewayState>) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app.into_make_service()).await
}
