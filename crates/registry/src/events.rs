use {async_trait::async_trait, serde::Serialize};

use botdesk_store::{EndUser, MessageRecord};

/// Flattened end-user fields embedded in realtime event payloads.
#[derive(Debug, Clone, Serialize)]
pub struct EndUserSummary {
    pub id: String,
    pub external_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl From<&EndUser> for EndUserSummary {
    fn from(user: &EndUser) -> Self {
        Self {
            id: user.id.clone(),
            external_id: user.external_id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    }
}

/// Payload of the single realtime event type: a freshly persisted inbound
/// message with its sender projection.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessageEvent {
    #[serde(flatten)]
    pub message: MessageRecord,
    pub user: EndUserSummary,
}

/// Push channel delivering new-message events to connected dashboard
/// sessions. At-most-once, best-effort: implementations never report
/// delivery failures back to the message path.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish_new_message(&self, event: NewMessageEvent);
}
