use std::sync::Arc;

use {
    async_trait::async_trait,
    tracing::{debug, warn},
};

use botdesk_registry::{EventSink, NewMessageEvent};

use crate::state::GatewayState;

/// Push one event frame to every connected dashboard client, dropping
/// clients whose write loop has gone away.
pub async fn broadcast(state: &GatewayState, event: &str, payload: serde_json::Value) {
    let frame = serde_json::json!({ "event": event, "payload": payload });
    let json = match serde_json::to_string(&frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(event, error = %e, "failed to serialize event frame");
            return;
        }
    };

    let mut stale = Vec::new();
    {
        let clients = state.clients.read().await;
        debug!(event, clients = clients.len(), "broadcasting event");
        for client in clients.values() {
            if !client.send(&json) {
                stale.push(client.conn_id.clone());
            }
        }
    }
    if !stale.is_empty() {
        let mut clients = state.clients.write().await;
        for conn_id in stale {
            clients.remove(&conn_id);
        }
    }
}

/// [`EventSink`] implementation wiring the registry's realtime events onto
/// the WebSocket fan-out.
pub struct WsEventSink {
    state: tokio::sync::OnceCell<Arc<GatewayState>>,
}

impl WsEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: tokio::sync::OnceCell::new(),
        }
    }

    /// Late-bound because the registry (which owns the sink) is itself part
    /// of the gateway state. Set exactly once during startup wiring.
    pub fn bind(&self, state: Arc<GatewayState>) {
        if self.state.set(state).is_err() {
            warn!("event sink already bound");
        }
    }
}

impl Default for WsEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for WsEventSink {
    async fn publish_new_message(&self, event: NewMessageEvent) {
        let Some(state) = self.state.get() else {
            debug!("event sink not bound yet, dropping event");
            return;
        };
        match serde_json::to_value(&event) {
            Ok(payload) => broadcast(state, "new_message", payload).await,
            Err(e) => warn!(error = %e, "failed to serialize new message event"),
        }
    }
}
