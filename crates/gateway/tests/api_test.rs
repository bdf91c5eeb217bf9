//! Handler-level tests for access scoping and the webhook's in-band error
//! contract, against an in-memory store and a stub transport.

#![allow(clippy::unwrap_used)]

use std::{collections::HashMap, sync::Arc};

use {
    anyhow::anyhow,
    async_trait::async_trait,
    axum::{
        Extension, Json,
        extract::{Path, Query, State},
    },
    serde_json::json,
};

use {
    botdesk_common::AgentRole,
    botdesk_gateway::{
        ApiError, GatewayState, StaticTokenVerifier, WsEventSink,
        access::{accessible_bot_ids, verify_bot_access},
        auth::CurrentAgent,
        chat,
        webhook::webhook_handler,
    },
    botdesk_registry::{AdapterFactory, BotAdapter, BotRegistry, InboundUpdate, SenderIdentity},
    botdesk_store::{
        Bot, ConversationStore, NewAgent, NewAssignment, NewBot, NewEndUser, SqliteStore,
    },
};

struct StubAdapter;

#[async_trait]
impl BotAdapter for StubAdapter {
    fn decode(&self, raw: serde_json::Value) -> anyhow::Result<InboundUpdate> {
        let text = raw
            .get("text")
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow!("no text"))?;
        Ok(InboundUpdate::Text {
            sender: SenderIdentity {
                external_id: raw["from"]["id"].as_i64().unwrap_or(0),
                first_name: "Test".to_string(),
                last_name: None,
                username: None,
            },
            text: text.to_string(),
        })
    }

    async fn send_text(&self, _chat_id: i64, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_photo(
        &self,
        _chat_id: i64,
        _photo_ref: &str,
        _caption: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn download_photo(&self, file_id: &str) -> anyhow::Result<String> {
        Ok(format!("/uploads/{file_id}"))
    }
}

struct StubFactory;

#[async_trait]
impl AdapterFactory for StubFactory {
    async fn connect(&self, _bot: &Bot) -> anyhow::Result<Arc<dyn BotAdapter>> {
        Ok(Arc::new(StubAdapter))
    }
}

async fn setup() -> Arc<GatewayState> {
    let store: Arc<SqliteStore> = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let sink = Arc::new(WsEventSink::new());
    let registry = Arc::new(BotRegistry::new(
        Arc::new(StubFactory),
        Arc::clone(&store) as Arc<dyn ConversationStore>,
        sink.clone(),
    ));
    let auth = Arc::new(StaticTokenVerifier::new(
        Arc::clone(&store) as Arc<dyn ConversationStore>,
        HashMap::new(),
    ));
    let state = Arc::new(GatewayState::new(
        store,
        registry,
        auth,
        std::env::temp_dir().join("botdesk-test-uploads"),
    ));
    sink.bind(Arc::clone(&state));
    state
}

async fn seed_agent(state: &GatewayState, username: &str, role: AgentRole) -> CurrentAgent {
    let agent = state
        .store
        .create_agent(NewAgent {
            username: username.to_string(),
            password_hash: "x".to_string(),
            role,
        })
        .await
        .unwrap();
    CurrentAgent(agent)
}

async fn seed_bot(state: &GatewayState, name: &str, token: &str) -> Bot {
    let bot = state
        .store
        .create_bot(NewBot {
            display_name: name.to_string(),
            secret_token: token.to_string(),
            is_active: true,
        })
        .await
        .unwrap();
    state.registry.start_bot(&bot).await;
    bot
}

async fn seed_end_user(state: &GatewayState, bot_id: &str, external_id: i64) -> String {
    state
        .store
        .create_end_user(NewEndUser {
            external_id,
            first_name: "Ada".to_string(),
            last_name: None,
            username: None,
            bot_id: bot_id.to_string(),
        })
        .await
        .unwrap()
        .id
}

async fn assign(state: &GatewayState, bot_id: &str, agent: &CurrentAgent) {
    state
        .store
        .create_assignment(NewAssignment {
            bot_id: bot_id.to_string(),
            agent_id: agent.0.id.clone(),
            telegram_notification_id: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn super_admin_accesses_any_bot() {
    let state = setup().await;
    let admin = seed_agent(&state, "root", AgentRole::SuperAdmin).await;
    let bot = seed_bot(&state, "Alpha", "tok-a").await;

    verify_bot_access(&state, &admin, &bot.id).await.unwrap();
    let ids = accessible_bot_ids(&state, &admin).await.unwrap();
    assert_eq!(ids, vec![bot.id]);
}

#[tokio::test]
async fn admin_without_assignment_is_forbidden() {
    let state = setup().await;
    let agent = seed_agent(&state, "eve", AgentRole::Admin).await;
    let bot = seed_bot(&state, "Alpha", "tok-a").await;

    let err = verify_bot_access(&state, &agent, &bot.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));
    assert!(accessible_bot_ids(&state, &agent).await.unwrap().is_empty());
}

#[tokio::test]
async fn admin_with_assignment_sees_only_assigned_bots() {
    let state = setup().await;
    let agent = seed_agent(&state, "bob", AgentRole::Admin).await;
    let mine = seed_bot(&state, "Mine", "tok-a").await;
    let other = seed_bot(&state, "Other", "tok-b").await;
    assign(&state, &mine.id, &agent).await;

    verify_bot_access(&state, &agent, &mine.id).await.unwrap();
    assert!(verify_bot_access(&state, &agent, &other.id).await.is_err());
    assert_eq!(
        accessible_bot_ids(&state, &agent).await.unwrap(),
        vec![mine.id]
    );
}

#[tokio::test]
async fn messages_of_unassigned_bot_are_forbidden() {
    let state = setup().await;
    let agent = seed_agent(&state, "bob", AgentRole::Admin).await;
    let bot = seed_bot(&state, "Alpha", "tok-a").await;
    let user_id = seed_end_user(&state, &bot.id, 42).await;

    let result = chat::list_messages(
        State(Arc::clone(&state)),
        Extension(agent),
        Path(user_id),
        Query(chat::MessagesQuery {
            page: None,
            limit: None,
            search: None,
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Forbidden)));
}

#[tokio::test]
async fn reply_rejects_empty_body() {
    let state = setup().await;
    let admin = seed_agent(&state, "root", AgentRole::SuperAdmin).await;
    let bot = seed_bot(&state, "Alpha", "tok-a").await;
    let user_id = seed_end_user(&state, &bot.id, 42).await;

    let result = chat::reply(
        State(Arc::clone(&state)),
        Extension(admin),
        Path(user_id),
        Json(chat::ReplyBody {
            content: String::new(),
            photo_ref: None,
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));
}

#[tokio::test]
async fn reply_round_trips_through_registry() {
    let state = setup().await;
    let admin = seed_agent(&state, "root", AgentRole::SuperAdmin).await;
    let bot = seed_bot(&state, "Alpha", "tok-a").await;
    let user_id = seed_end_user(&state, &bot.id, 42).await;

    let Json(message) = chat::reply(
        State(Arc::clone(&state)),
        Extension(admin),
        Path(user_id.clone()),
        Json(chat::ReplyBody {
            content: "hello".to_string(),
            photo_ref: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(message.content, "hello");
    assert!(message.is_read);
    assert_eq!(message.user_id, user_id);
}

#[tokio::test]
async fn webhook_reports_stopped_bot_in_band() {
    let state = setup().await;
    let Json(ack) = webhook_handler(
        State(Arc::clone(&state)),
        Path("ghost".to_string()),
        Json(json!({ "text": "hi", "from": { "id": 1 } })),
    )
    .await;
    assert!(!ack.ok);
    assert!(ack.message.unwrap().contains("not running"));
}

#[tokio::test]
async fn webhook_acknowledges_handled_update() {
    let state = setup().await;
    let bot = seed_bot(&state, "Alpha", "tok-a").await;

    let Json(ack) = webhook_handler(
        State(Arc::clone(&state)),
        Path(bot.id.clone()),
        Json(json!({ "text": "hi", "from": { "id": 7 } })),
    )
    .await;
    assert!(ack.ok);
    assert!(ack.message.is_none());

    let user = state.store.find_end_user(&bot.id, 7).await.unwrap();
    assert!(user.is_some());
}

#[tokio::test]
async fn webhook_reports_malformed_payload_in_band() {
    let state = setup().await;
    let bot = seed_bot(&state, "Alpha", "tok-a").await;

    let Json(ack) = webhook_handler(
        State(Arc::clone(&state)),
        Path(bot.id),
        Json(json!({ "garbage": true })),
    )
    .await;
    assert!(!ack.ok);
    assert!(ack.message.is_some());
}

#[tokio::test]
async fn stats_are_scoped_to_accessible_bots() {
    let state = setup().await;
    let agent = seed_agent(&state, "bob", AgentRole::Admin).await;
    let mine = seed_bot(&state, "Mine", "tok-a").await;
    let other = seed_bot(&state, "Other", "tok-b").await;
    assign(&state, &mine.id, &agent).await;

    // One message per bot via the webhook path.
    webhook_handler(
        State(Arc::clone(&state)),
        Path(mine.id.clone()),
        Json(json!({ "text": "a", "from": { "id": 1 } })),
    )
    .await;
    webhook_handler(
        State(Arc::clone(&state)),
        Path(other.id.clone()),
        Json(json!({ "text": "b", "from": { "id": 2 } })),
    )
    .await;

    let Json(stats) = chat::stats(State(Arc::clone(&state)), Extension(agent))
        .await
        .unwrap();
    assert_eq!(stats.total_users, 1);
    assert_eq!(stats.total_messages, 1);
    assert_eq!(stats.unread_messages, 1);
}

#[tokio::test]
async fn overview_is_scoped_to_accessible_bots() {
    let state = setup().await;
    let agent = seed_agent(&state, "bob", AgentRole::Admin).await;
    let mine = seed_bot(&state, "Mine", "tok-a").await;
    let other = seed_bot(&state, "Other", "tok-b").await;
    assign(&state, &mine.id, &agent).await;
    seed_end_user(&state, &mine.id, 1).await;
    seed_end_user(&state, &other.id, 2).await;

    let Json(users) = chat::list_users(State(Arc::clone(&state)), Extension(agent))
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].bot_id, mine.id);
}
