use {
    botdesk_common::{AgentRole, MessageSender},
    serde::{Deserialize, Serialize},
};

/// A registered Telegram bot managed by the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Bot {
    pub id: String,
    pub display_name: String,
    pub secret_token: String,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBot {
    pub display_name: String,
    pub secret_token: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Partial bot update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotPatch {
    pub display_name: Option<String>,
    pub secret_token: Option<String>,
    pub is_active: Option<bool>,
}

/// A human dashboard user. Password hashing and token issuance are owned by
/// the external auth service; `password_hash` is opaque here.
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: AgentRole,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub username: String,
    pub password_hash: String,
    pub role: AgentRole,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentPatch {
    pub password_hash: Option<String>,
    pub role: Option<AgentRole>,
}

/// Grants an agent access to a bot's conversations. When
/// `telegram_notification_id` is set it is the agent's *personal* Telegram
/// chat id used for push notifications — distinct from any end-user identity.
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub id: String,
    pub bot_id: String,
    pub agent_id: String,
    pub telegram_notification_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub bot_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub telegram_notification_id: Option<String>,
}

/// A remote person messaging through a given bot. The same Telegram identity
/// may exist independently under multiple bots.
#[derive(Debug, Clone, Serialize)]
pub struct EndUser {
    pub id: String,
    pub external_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub bot_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewEndUser {
    pub external_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub bot_id: String,
}

/// A persisted conversation message. Immutable once created except the
/// `is_read` flip.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub id: String,
    pub content: String,
    pub sender: MessageSender,
    pub is_read: bool,
    pub photo_ref: Option<String>,
    pub user_id: String,
    pub bot_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub sender: MessageSender,
    pub is_read: bool,
    pub photo_ref: Option<String>,
    pub user_id: String,
    pub bot_id: String,
}

/// Conversation list entry for the dashboard sidebar.
#[derive(Debug, Clone, Serialize)]
pub struct UserOverview {
    pub id: String,
    pub external_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub bot_id: String,
    pub bot_name: Option<String>,
    pub unread_count: i64,
    pub last_message: Option<LastMessage>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastMessage {
    pub content: String,
    pub sender: MessageSender,
    pub created_at: i64,
}

/// One page of a user's conversation, oldest-first within the page.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<MessageRecord>,
    pub total: i64,
    pub has_more: bool,
}

/// Aggregate counters scoped to a set of accessible bots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatStats {
    pub total_users: i64,
    pub total_messages: i64,
    pub unread_messages: i64,
}
