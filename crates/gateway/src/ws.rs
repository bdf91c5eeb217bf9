use std::sync::Arc;

use {
    axum::{
        extract::{
            Query, State, WebSocketUpgrade,
            ws::{Message, WebSocket},
        },
        response::Response,
    },
    futures::{SinkExt, stream::StreamExt},
    serde::Deserialize,
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::{error::ApiError, state::{ConnectedClient, GatewayState}};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: String,
}

/// `GET /ws?token=...` — browsers cannot set headers on WebSocket upgrades,
/// so the bearer token rides in the query string.
pub async fn ws_upgrade_handler(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let agent = state
        .auth
        .verify(&params.token)
        .await
        .ok_or(ApiError::Unauthorized)?;
    Ok(ws.on_upgrade(move |socket| handle_connection(socket, state, agent.id)))
}

/// Push-only connection: frames flow server → client; anything the client
/// sends besides close is ignored.
async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>, agent_id: String) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, agent_id = %agent_id, "ws: connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<String>();

    let write_conn_id = conn_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(msg) = client_rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                debug!(conn_id = %write_conn_id, "ws: write loop closed");
                break;
            }
        }
    });

    state.clients.write().await.insert(
        conn_id.clone(),
        ConnectedClient {
            conn_id: conn_id.clone(),
            agent_id: agent_id.clone(),
            sender: client_tx,
        },
    );

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "ws: read error");
                break;
            }
        }
    }

    state.clients.write().await.remove(&conn_id);
    write_handle.abort();
    info!(conn_id = %conn_id, agent_id = %agent_id, "ws: disconnected");
}
