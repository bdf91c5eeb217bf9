use std::{collections::HashMap, path::PathBuf, sync::Arc};

use tokio::sync::{RwLock, mpsc};

use {
    botdesk_registry::BotRegistry,
    botdesk_store::ConversationStore,
};

use crate::auth::AuthVerifier;

/// One connected dashboard WebSocket session.
pub struct ConnectedClient {
    pub conn_id: String,
    pub agent_id: String,
    /// Serialized frames handed to this client's write loop.
    pub sender: mpsc::UnboundedSender<String>,
}

impl ConnectedClient {
    /// Queue a frame; `false` means the write loop is gone and the client
    /// should be dropped.
    pub fn send(&self, json: &str) -> bool {
        self.sender.send(json.to_string()).is_ok()
    }
}

/// Shared state behind every gateway handler.
pub struct GatewayState {
    pub store: Arc<dyn ConversationStore>,
    pub registry: Arc<BotRegistry>,
    pub auth: Arc<dyn AuthVerifier>,
    pub uploads_dir: PathBuf,
    pub clients: RwLock<HashMap<String, ConnectedClient>>,
}

impl GatewayState {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        registry: Arc<BotRegistry>,
        auth: Arc<dyn AuthVerifier>,
        uploads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            registry,
            auth,
            uploads_dir: uploads_dir.into(),
            clients: RwLock::new(HashMap::new()),
        }
    }
}
