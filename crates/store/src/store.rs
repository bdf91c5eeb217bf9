use async_trait::async_trait;

use crate::{
    error::Result,
    types::{
        Agent, AgentPatch, Assignment, Bot, BotPatch, ChatStats, EndUser, MessagePage,
        MessageRecord, NewAgent, NewAssignment, NewBot, NewEndUser, NewMessage, UserOverview,
    },
};

/// Durable storage boundary for the whole system.
///
/// Getters return `Ok(None)` for missing rows; mutations return
/// [`crate::StoreError::NotFound`] / [`crate::StoreError::Conflict`] so
/// callers can map them to their own failure surface.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    // ── Bots ────────────────────────────────────────────────────────────

    async fn create_bot(&self, bot: NewBot) -> Result<Bot>;
    async fn bot(&self, id: &str) -> Result<Option<Bot>>;
    async fn list_bots(&self) -> Result<Vec<Bot>>;
    async fn list_active_bots(&self) -> Result<Vec<Bot>>;
    async fn update_bot(&self, id: &str, patch: BotPatch) -> Result<Bot>;
    /// Deleting a bot cascades to its assignments, end users, and messages.
    async fn delete_bot(&self, id: &str) -> Result<()>;

    // ── Agents ──────────────────────────────────────────────────────────

    async fn create_agent(&self, agent: NewAgent) -> Result<Agent>;
    async fn agent(&self, id: &str) -> Result<Option<Agent>>;
    async fn agent_by_username(&self, username: &str) -> Result<Option<Agent>>;
    async fn list_agents(&self) -> Result<Vec<Agent>>;
    async fn update_agent(&self, id: &str, patch: AgentPatch) -> Result<Agent>;
    async fn delete_agent(&self, id: &str) -> Result<()>;

    // ── Assignments ─────────────────────────────────────────────────────

    async fn create_assignment(&self, assignment: NewAssignment) -> Result<Assignment>;
    async fn assignments_for_bot(&self, bot_id: &str) -> Result<Vec<Assignment>>;
    async fn assignments_for_agent(&self, agent_id: &str) -> Result<Vec<Assignment>>;
    async fn update_assignment(
        &self,
        id: &str,
        telegram_notification_id: Option<String>,
    ) -> Result<Assignment>;
    async fn delete_assignment(&self, id: &str) -> Result<()>;

    // ── End users ───────────────────────────────────────────────────────

    async fn find_end_user(&self, bot_id: &str, external_id: i64) -> Result<Option<EndUser>>;
    async fn create_end_user(&self, user: NewEndUser) -> Result<EndUser>;
    async fn end_user(&self, id: &str) -> Result<Option<EndUser>>;
    /// Bump `updated_at` so the conversation sorts to the top of the list.
    async fn touch_end_user(&self, id: &str) -> Result<()>;
    /// Conversation overview for the given bots, most recently active first.
    async fn list_users_overview(&self, bot_ids: &[String]) -> Result<Vec<UserOverview>>;

    // ── Messages ────────────────────────────────────────────────────────

    async fn create_message(&self, message: NewMessage) -> Result<MessageRecord>;
    async fn message(&self, id: &str) -> Result<Option<MessageRecord>>;
    /// Paginated history for one user; newest page first, oldest-first
    /// within the page, optional content substring filter.
    async fn messages_for_user(
        &self,
        user_id: &str,
        bot_id: &str,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> Result<MessagePage>;
    async fn chat_stats(&self, bot_ids: &[String]) -> Result<ChatStats>;
    async fn mark_message_read(&self, message_id: &str) -> Result<()>;
    /// Mark every unread end-user message in one conversation as read.
    async fn mark_user_messages_read(&self, user_id: &str, bot_id: &str) -> Result<()>;
}
