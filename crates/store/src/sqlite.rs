use std::str::FromStr;

use {
    async_trait::async_trait,
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::info,
};

use botdesk_common::{MessageSender, new_id, now_millis};

use crate::{
    error::{Result, StoreError},
    store::ConversationStore,
    types::{
        Agent, AgentPatch, Assignment, Bot, BotPatch, ChatStats, EndUser, LastMessage,
        MessagePage, MessageRecord, NewAgent, NewAssignment, NewBot, NewEndUser, NewMessage,
        UserOverview,
    },
};

/// SQLite-backed conversation store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) a database at `url` and initialize the
    /// schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory SQLite database exists per connection, so the pool
        // must never hand out a second one.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::init(&pool).await?;
        info!(url, "conversation store ready");
        Ok(Self::new(pool))
    }

    /// Initialize the schema.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS bots (
                id           TEXT    PRIMARY KEY,
                display_name TEXT    NOT NULL,
                secret_token TEXT    NOT NULL UNIQUE,
                is_active    INTEGER NOT NULL DEFAULT 0,
                created_at   INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agents (
                id            TEXT    PRIMARY KEY,
                username      TEXT    NOT NULL UNIQUE,
                password_hash TEXT    NOT NULL,
                role          TEXT    NOT NULL,
                created_at    INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS assignments (
                id                       TEXT PRIMARY KEY,
                bot_id                   TEXT NOT NULL REFERENCES bots (id) ON DELETE CASCADE,
                agent_id                 TEXT NOT NULL REFERENCES agents (id) ON DELETE CASCADE,
                telegram_notification_id TEXT,
                UNIQUE (bot_id, agent_id)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS end_users (
                id          TEXT    PRIMARY KEY,
                external_id INTEGER NOT NULL,
                first_name  TEXT    NOT NULL,
                last_name   TEXT,
                username    TEXT,
                bot_id      TEXT    NOT NULL REFERENCES bots (id) ON DELETE CASCADE,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL,
                UNIQUE (external_id, bot_id)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id         TEXT    PRIMARY KEY,
                content    TEXT    NOT NULL,
                sender     TEXT    NOT NULL,
                is_read    INTEGER NOT NULL DEFAULT 0,
                photo_ref  TEXT,
                user_id    TEXT    NOT NULL REFERENCES end_users (id) ON DELETE CASCADE,
                bot_id     TEXT    NOT NULL REFERENCES bots (id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_user_created
             ON messages (user_id, created_at DESC)",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_bot ON messages (bot_id)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Build an `IN (?, ?, …)` clause for `n` bound values.
    fn placeholders(n: usize) -> String {
        vec!["?"; n].join(", ")
    }
}

type BotRow = (String, String, String, bool, i64);

fn bot_from_row(r: BotRow) -> Bot {
    Bot {
        id: r.0,
        display_name: r.1,
        secret_token: r.2,
        is_active: r.3,
        created_at: r.4,
    }
}

type AgentRow = (String, String, String, String, i64);

fn agent_from_row(r: AgentRow) -> Result<Agent> {
    Ok(Agent {
        id: r.0,
        username: r.1,
        password_hash: r.2,
        role: r.3.parse().map_err(|e| StoreError::Corrupt(format!("{e}")))?,
        created_at: r.4,
    })
}

type AssignmentRow = (String, String, String, Option<String>);

fn assignment_from_row(r: AssignmentRow) -> Assignment {
    Assignment {
        id: r.0,
        bot_id: r.1,
        agent_id: r.2,
        telegram_notification_id: r.3,
    }
}

type EndUserRow = (String, i64, String, Option<String>, Option<String>, String, i64, i64);

fn end_user_from_row(r: EndUserRow) -> EndUser {
    EndUser {
        id: r.0,
        external_id: r.1,
        first_name: r.2,
        last_name: r.3,
        username: r.4,
        bot_id: r.5,
        created_at: r.6,
        updated_at: r.7,
    }
}

type MessageRow = (
    String,
    String,
    String,
    bool,
    Option<String>,
    String,
    String,
    i64,
);

fn message_from_row(r: MessageRow) -> Result<MessageRecord> {
    Ok(MessageRecord {
        id: r.0,
        content: r.1,
        sender: r.2.parse().map_err(|e| StoreError::Corrupt(format!("{e}")))?,
        is_read: r.3,
        photo_ref: r.4,
        user_id: r.5,
        bot_id: r.6,
        created_at: r.7,
    })
}

const BOT_COLS: &str = "id, display_name, secret_token, is_active, created_at";
const AGENT_COLS: &str = "id, username, password_hash, role, created_at";
const ASSIGNMENT_COLS: &str = "id, bot_id, agent_id, telegram_notification_id";
const END_USER_COLS: &str =
    "id, external_id, first_name, last_name, username, bot_id, created_at, updated_at";
const MESSAGE_COLS: &str =
    "id, content, sender, is_read, photo_ref, user_id, bot_id, created_at";

#[async_trait]
impl ConversationStore for SqliteStore {
    // ── Bots ────────────────────────────────────────────────────────────

    async fn create_bot(&self, bot: NewBot) -> Result<Bot> {
        let record = Bot {
            id: new_id(),
            display_name: bot.display_name,
            secret_token: bot.secret_token,
            is_active: bot.is_active,
            created_at: now_millis(),
        };
        sqlx::query(
            "INSERT INTO bots (id, display_name, secret_token, is_active, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.display_name)
        .bind(&record.secret_token)
        .bind(record.is_active)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "bot token"))?;
        Ok(record)
    }

    async fn bot(&self, id: &str) -> Result<Option<Bot>> {
        let row = sqlx::query_as::<_, BotRow>(&format!("SELECT {BOT_COLS} FROM bots WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(bot_from_row))
    }

    async fn list_bots(&self) -> Result<Vec<Bot>> {
        let rows = sqlx::query_as::<_, BotRow>(&format!(
            "SELECT {BOT_COLS} FROM bots ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(bot_from_row).collect())
    }

    async fn list_active_bots(&self) -> Result<Vec<Bot>> {
        let rows = sqlx::query_as::<_, BotRow>(&format!(
            "SELECT {BOT_COLS} FROM bots WHERE is_active = 1 ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(bot_from_row).collect())
    }

    async fn update_bot(&self, id: &str, patch: BotPatch) -> Result<Bot> {
        let mut bot = self.bot(id).await?.ok_or(StoreError::not_found("bot"))?;
        if let Some(name) = patch.display_name {
            bot.display_name = name;
        }
        if let Some(token) = patch.secret_token {
            bot.secret_token = token;
        }
        if let Some(active) = patch.is_active {
            bot.is_active = active;
        }
        sqlx::query(
            "UPDATE bots SET display_name = ?, secret_token = ?, is_active = ? WHERE id = ?",
        )
        .bind(&bot.display_name)
        .bind(&bot.secret_token)
        .bind(bot.is_active)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "bot token"))?;
        Ok(bot)
    }

    async fn delete_bot(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM bots WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("bot"));
        }
        Ok(())
    }

    // ── Agents ──────────────────────────────────────────────────────────

    async fn create_agent(&self, agent: NewAgent) -> Result<Agent> {
        let record = Agent {
            id: new_id(),
            username: agent.username,
            password_hash: agent.password_hash,
            role: agent.role,
            created_at: now_millis(),
        };
        sqlx::query(
            "INSERT INTO agents (id, username, password_hash, role, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.username)
        .bind(&record.password_hash)
        .bind(record.role.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "agent username"))?;
        Ok(record)
    }

    async fn agent(&self, id: &str) -> Result<Option<Agent>> {
        let row =
            sqlx::query_as::<_, AgentRow>(&format!("SELECT {AGENT_COLS} FROM agents WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(agent_from_row).transpose()
    }

    async fn agent_by_username(&self, username: &str) -> Result<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLS} FROM agents WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(agent_from_row).transpose()
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLS} FROM agents ORDER BY username ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(agent_from_row).collect()
    }

    async fn update_agent(&self, id: &str, patch: AgentPatch) -> Result<Agent> {
        let mut agent = self.agent(id).await?.ok_or(StoreError::not_found("agent"))?;
        if let Some(hash) = patch.password_hash {
            agent.password_hash = hash;
        }
        if let Some(role) = patch.role {
            agent.role = role;
        }
        sqlx::query("UPDATE agents SET password_hash = ?, role = ? WHERE id = ?")
            .bind(&agent.password_hash)
            .bind(agent.role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(agent)
    }

    async fn delete_agent(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("agent"));
        }
        Ok(())
    }

    // ── Assignments ─────────────────────────────────────────────────────

    async fn create_assignment(&self, assignment: NewAssignment) -> Result<Assignment> {
        let record = Assignment {
            id: new_id(),
            bot_id: assignment.bot_id,
            agent_id: assignment.agent_id,
            telegram_notification_id: assignment.telegram_notification_id,
        };
        sqlx::query(
            "INSERT INTO assignments (id, bot_id, agent_id, telegram_notification_id)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.bot_id)
        .bind(&record.agent_id)
        .bind(&record.telegram_notification_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let db = e.as_database_error();
            if db.is_some_and(|d| d.is_unique_violation()) {
                StoreError::conflict("assignment")
            } else if db.is_some_and(|d| d.is_foreign_key_violation()) {
                StoreError::not_found("bot or agent")
            } else {
                StoreError::Sqlx(e)
            }
        })?;
        Ok(record)
    }

    async fn assignments_for_bot(&self, bot_id: &str) -> Result<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {ASSIGNMENT_COLS} FROM assignments WHERE bot_id = ? ORDER BY rowid ASC"
        ))
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(assignment_from_row).collect())
    }

    async fn assignments_for_agent(&self, agent_id: &str) -> Result<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {ASSIGNMENT_COLS} FROM assignments WHERE agent_id = ? ORDER BY rowid ASC"
        ))
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(assignment_from_row).collect())
    }

    async fn update_assignment(
        &self,
        id: &str,
        telegram_notification_id: Option<String>,
    ) -> Result<Assignment> {
        let result = sqlx::query("UPDATE assignments SET telegram_notification_id = ? WHERE id = ?")
            .bind(&telegram_notification_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("assignment"));
        }
        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {ASSIGNMENT_COLS} FROM assignments WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(assignment_from_row(row))
    }

    async fn delete_assignment(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("assignment"));
        }
        Ok(())
    }

    // ── End users ───────────────────────────────────────────────────────

    async fn find_end_user(&self, bot_id: &str, external_id: i64) -> Result<Option<EndUser>> {
        let row = sqlx::query_as::<_, EndUserRow>(&format!(
            "SELECT {END_USER_COLS} FROM end_users WHERE bot_id = ? AND external_id = ?"
        ))
        .bind(bot_id)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(end_user_from_row))
    }

    async fn create_end_user(&self, user: NewEndUser) -> Result<EndUser> {
        let now = now_millis();
        let record = EndUser {
            id: new_id(),
            external_id: user.external_id,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            bot_id: user.bot_id,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO end_users
             (id, external_id, first_name, last_name, username, bot_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(record.external_id)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.username)
        .bind(&record.bot_id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "end user"))?;
        Ok(record)
    }

    async fn end_user(&self, id: &str) -> Result<Option<EndUser>> {
        let row = sqlx::query_as::<_, EndUserRow>(&format!(
            "SELECT {END_USER_COLS} FROM end_users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(end_user_from_row))
    }

    async fn touch_end_user(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE end_users SET updated_at = ? WHERE id = ?")
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_users_overview(&self, bot_ids: &[String]) -> Result<Vec<UserOverview>> {
        if bot_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT u.id, u.external_id, u.first_name, u.last_name, u.username,
                    u.bot_id, b.display_name, u.updated_at
             FROM end_users u
             LEFT JOIN bots b ON b.id = u.bot_id
             WHERE u.bot_id IN ({})
             ORDER BY u.updated_at DESC, u.rowid DESC",
            Self::placeholders(bot_ids.len())
        );
        let mut query = sqlx::query_as::<
            _,
            (
                String,
                i64,
                String,
                Option<String>,
                Option<String>,
                String,
                Option<String>,
                i64,
            ),
        >(&sql);
        for id in bot_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut overviews = Vec::with_capacity(rows.len());
        for r in rows {
            let unread_count: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM messages
                 WHERE user_id = ? AND sender = 'end_user' AND is_read = 0",
            )
            .bind(&r.0)
            .fetch_one(&self.pool)
            .await?;

            let last: Option<(String, String, i64)> = sqlx::query_as(
                "SELECT content, sender, created_at FROM messages
                 WHERE user_id = ?
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
            )
            .bind(&r.0)
            .fetch_optional(&self.pool)
            .await?;

            let last_message = last
                .map(|(content, sender, created_at)| {
                    Ok::<_, StoreError>(LastMessage {
                        content,
                        sender: sender
                            .parse::<MessageSender>()
                            .map_err(|e| StoreError::Corrupt(format!("{e}")))?,
                        created_at,
                    })
                })
                .transpose()?;

            overviews.push(UserOverview {
                id: r.0,
                external_id: r.1,
                first_name: r.2,
                last_name: r.3,
                username: r.4,
                bot_id: r.5,
                bot_name: r.6,
                unread_count: unread_count.0,
                last_message,
                updated_at: r.7,
            });
        }
        Ok(overviews)
    }

    // ── Messages ────────────────────────────────────────────────────────

    async fn create_message(&self, message: NewMessage) -> Result<MessageRecord> {
        let record = MessageRecord {
            id: new_id(),
            content: message.content,
            sender: message.sender,
            is_read: message.is_read,
            photo_ref: message.photo_ref,
            user_id: message.user_id,
            bot_id: message.bot_id,
            created_at: now_millis(),
        };
        sqlx::query(
            "INSERT INTO messages
             (id, content, sender, is_read, photo_ref, user_id, bot_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.content)
        .bind(record.sender.as_str())
        .bind(record.is_read)
        .bind(&record.photo_ref)
        .bind(&record.user_id)
        .bind(&record.bot_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn message(&self, id: &str) -> Result<Option<MessageRecord>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLS} FROM messages WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(message_from_row).transpose()
    }

    async fn messages_for_user(
        &self,
        user_id: &str,
        bot_id: &str,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> Result<MessagePage> {
        let filter = if search.is_some() {
            " AND content LIKE '%' || ? || '%'"
        } else {
            ""
        };

        let count_sql =
            format!("SELECT COUNT(*) FROM messages WHERE user_id = ? AND bot_id = ?{filter}");
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql).bind(user_id).bind(bot_id);
        if let Some(term) = search {
            count_query = count_query.bind(term);
        }
        let (total,) = count_query.fetch_one(&self.pool).await?;

        let page_sql = format!(
            "SELECT {MESSAGE_COLS} FROM messages
             WHERE user_id = ? AND bot_id = ?{filter}
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?"
        );
        let mut page_query = sqlx::query_as::<_, MessageRow>(&page_sql).bind(user_id).bind(bot_id);
        if let Some(term) = search {
            page_query = page_query.bind(term);
        }
        let rows = page_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        // Newest page first, but oldest-first within the page for chat display.
        let mut messages = rows
            .into_iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>>>()?;
        messages.reverse();

        Ok(MessagePage {
            messages,
            total,
            has_more: offset + limit < total,
        })
    }

    async fn chat_stats(&self, bot_ids: &[String]) -> Result<ChatStats> {
        if bot_ids.is_empty() {
            return Ok(ChatStats::default());
        }
        let marks = Self::placeholders(bot_ids.len());

        let sql = format!("SELECT COUNT(*) FROM end_users WHERE bot_id IN ({marks})");
        let mut query = sqlx::query_as::<_, (i64,)>(&sql);
        for id in bot_ids {
            query = query.bind(id);
        }
        let (total_users,) = query.fetch_one(&self.pool).await?;

        let sql = format!("SELECT COUNT(*) FROM messages WHERE bot_id IN ({marks})");
        let mut query = sqlx::query_as::<_, (i64,)>(&sql);
        for id in bot_ids {
            query = query.bind(id);
        }
        let (total_messages,) = query.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT COUNT(*) FROM messages
             WHERE bot_id IN ({marks}) AND sender = 'end_user' AND is_read = 0"
        );
        let mut query = sqlx::query_as::<_, (i64,)>(&sql);
        for id in bot_ids {
            query = query.bind(id);
        }
        let (unread_messages,) = query.fetch_one(&self.pool).await?;

        Ok(ChatStats {
            total_users,
            total_messages,
            unread_messages,
        })
    }

    async fn mark_message_read(&self, message_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("message"));
        }
        Ok(())
    }

    async fn mark_user_messages_read(&self, user_id: &str, bot_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE messages SET is_read = 1
             WHERE user_id = ? AND bot_id = ? AND sender = 'end_user' AND is_read = 0",
        )
        .bind(user_id)
        .bind(bot_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {super::*, botdesk_common::AgentRole};

    async fn test_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn new_bot(token: &str) -> NewBot {
        NewBot {
            display_name: format!("bot-{token}"),
            secret_token: token.to_string(),
            is_active: true,
        }
    }

    fn new_end_user(bot_id: &str, external_id: i64) -> NewEndUser {
        NewEndUser {
            external_id,
            first_name: "Ada".into(),
            last_name: None,
            username: Some("ada".into()),
            bot_id: bot_id.to_string(),
        }
    }

    fn inbound(user: &EndUser, content: &str) -> NewMessage {
        NewMessage {
            content: content.into(),
            sender: MessageSender::EndUser,
            is_read: false,
            photo_ref: None,
            user_id: user.id.clone(),
            bot_id: user.bot_id.clone(),
        }
    }

    #[tokio::test]
    async fn duplicate_bot_token_conflicts() {
        let store = test_store().await;
        store.create_bot(new_bot("T1")).await.unwrap();
        let err = store.create_bot(new_bot("T1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn update_bot_rejects_duplicate_token() {
        let store = test_store().await;
        store.create_bot(new_bot("T1")).await.unwrap();
        let b2 = store.create_bot(new_bot("T2")).await.unwrap();
        let err = store
            .update_bot(
                &b2.id,
                BotPatch {
                    secret_token: Some("T1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn delete_bot_cascades_to_dependents() {
        let store = test_store().await;
        let bot = store.create_bot(new_bot("T1")).await.unwrap();
        let agent = store
            .create_agent(NewAgent {
                username: "kai".into(),
                password_hash: "x".into(),
                role: AgentRole::Admin,
            })
            .await
            .unwrap();
        store
            .create_assignment(NewAssignment {
                bot_id: bot.id.clone(),
                agent_id: agent.id.clone(),
                telegram_notification_id: None,
            })
            .await
            .unwrap();
        let user = store.create_end_user(new_end_user(&bot.id, 555)).await.unwrap();
        store.create_message(inbound(&user, "hi")).await.unwrap();

        store.delete_bot(&bot.id).await.unwrap();

        assert!(store.end_user(&user.id).await.unwrap().is_none());
        assert!(store.assignments_for_bot(&bot.id).await.unwrap().is_empty());
        let stats = store.chat_stats(&[bot.id.clone()]).await.unwrap();
        assert_eq!(stats.total_messages, 0);
        // The agent itself survives.
        assert!(store.agent(&agent.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn end_user_unique_per_bot_not_globally() {
        let store = test_store().await;
        let a = store.create_bot(new_bot("TA")).await.unwrap();
        let b = store.create_bot(new_bot("TB")).await.unwrap();

        store.create_end_user(new_end_user(&a.id, 555)).await.unwrap();
        // Same external identity under another bot is a distinct row.
        store.create_end_user(new_end_user(&b.id, 555)).await.unwrap();
        // Duplicate under the same bot conflicts.
        let err = store.create_end_user(new_end_user(&a.id, 555)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn assignment_unique_per_pair() {
        let store = test_store().await;
        let bot = store.create_bot(new_bot("T1")).await.unwrap();
        let agent = store
            .create_agent(NewAgent {
                username: "kai".into(),
                password_hash: "x".into(),
                role: AgentRole::Admin,
            })
            .await
            .unwrap();
        let pair = NewAssignment {
            bot_id: bot.id.clone(),
            agent_id: agent.id.clone(),
            telegram_notification_id: None,
        };
        store.create_assignment(pair.clone()).await.unwrap();
        let err = store.create_assignment(pair).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn assignment_requires_existing_rows() {
        let store = test_store().await;
        let err = store
            .create_assignment(NewAssignment {
                bot_id: "missing".into(),
                agent_id: "missing".into(),
                telegram_notification_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn message_pagination_reverses_within_page() {
        let store = test_store().await;
        let bot = store.create_bot(new_bot("T1")).await.unwrap();
        let user = store.create_end_user(new_end_user(&bot.id, 555)).await.unwrap();
        for i in 0..5 {
            store.create_message(inbound(&user, &format!("m{i}"))).await.unwrap();
        }

        let page = store
            .messages_for_user(&user.id, &bot.id, 2, 0, None)
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert!(page.has_more);
        // Newest two, oldest-first within the page.
        let contents: Vec<_> = page.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4"]);

        let last = store
            .messages_for_user(&user.id, &bot.id, 2, 4, None)
            .await
            .unwrap();
        assert_eq!(last.messages.len(), 1);
        assert!(!last.has_more);
    }

    #[tokio::test]
    async fn message_search_filters_by_content() {
        let store = test_store().await;
        let bot = store.create_bot(new_bot("T1")).await.unwrap();
        let user = store.create_end_user(new_end_user(&bot.id, 555)).await.unwrap();
        store.create_message(inbound(&user, "invoice overdue")).await.unwrap();
        store.create_message(inbound(&user, "hello there")).await.unwrap();

        let page = store
            .messages_for_user(&user.id, &bot.id, 20, 0, Some("invoice"))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.messages[0].content, "invoice overdue");
    }

    #[tokio::test]
    async fn stats_scope_to_bot_set_and_empty_set_is_zero() {
        let store = test_store().await;
        let a = store.create_bot(new_bot("TA")).await.unwrap();
        let b = store.create_bot(new_bot("TB")).await.unwrap();
        let ua = store.create_end_user(new_end_user(&a.id, 1)).await.unwrap();
        let ub = store.create_end_user(new_end_user(&b.id, 2)).await.unwrap();
        store.create_message(inbound(&ua, "a1")).await.unwrap();
        store.create_message(inbound(&ub, "b1")).await.unwrap();
        store.create_message(inbound(&ub, "b2")).await.unwrap();

        let scoped = store.chat_stats(&[b.id.clone()]).await.unwrap();
        assert_eq!(scoped.total_users, 1);
        assert_eq!(scoped.total_messages, 2);
        assert_eq!(scoped.unread_messages, 2);

        let empty = store.chat_stats(&[]).await.unwrap();
        assert_eq!(empty.total_users, 0);
        assert_eq!(empty.total_messages, 0);
    }

    #[tokio::test]
    async fn mark_user_messages_read_only_flips_end_user_unread() {
        let store = test_store().await;
        let bot = store.create_bot(new_bot("T1")).await.unwrap();
        let user = store.create_end_user(new_end_user(&bot.id, 555)).await.unwrap();
        store.create_message(inbound(&user, "one")).await.unwrap();
        store.create_message(inbound(&user, "two")).await.unwrap();

        store.mark_user_messages_read(&user.id, &bot.id).await.unwrap();
        let stats = store.chat_stats(&[bot.id.clone()]).await.unwrap();
        assert_eq!(stats.unread_messages, 0);
        assert_eq!(stats.total_messages, 2);
    }

    #[tokio::test]
    async fn overview_carries_unread_count_and_last_message() {
        let store = test_store().await;
        let bot = store.create_bot(new_bot("T1")).await.unwrap();
        let user = store.create_end_user(new_end_user(&bot.id, 555)).await.unwrap();
        store.create_message(inbound(&user, "first")).await.unwrap();
        store.create_message(inbound(&user, "second")).await.unwrap();

        let overview = store.list_users_overview(&[bot.id.clone()]).await.unwrap();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].unread_count, 2);
        assert_eq!(
            overview[0].last_message.as_ref().map(|m| m.content.as_str()),
            Some("second")
        );
        assert_eq!(overview[0].bot_name.as_deref(), Some("bot-T1"));
    }

    #[tokio::test]
    async fn mark_missing_message_is_not_found() {
        let store = test_store().await;
        let err = store.mark_message_read("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
