use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    tokio::sync::Mutex,
    tracing::{debug, error, info, warn},
};

use botdesk_store::{Bot, ConversationStore, MessageRecord};

use crate::{
    adapter::{AdapterFactory, BotAdapter},
    error::{RegistryError, Result},
    events::EventSink,
    handler::MessageHandler,
};

/// Upper bound on one webhook dispatch, so a stalled transport call cannot
/// starve other bots sharing the event loop.
const ROUTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Slot state for one bot id. `Pending` reserves the slot while the adapter
/// is being constructed, closing the check-then-act window between the
/// presence check and the (asynchronous) construction.
enum BotSlot {
    Pending,
    Live(Arc<dyn BotAdapter>),
}

/// Result of routing one webhook payload. Errors are reported in-band: the
/// HTTP boundary always answers 200 and puts failures in the body, because
/// the transport retries aggressively on non-2xx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// An inbound message was persisted and fanned out.
    Handled,
    /// The update decoded fine but carries nothing we handle.
    Ignored,
    /// No live adapter for this bot id.
    NotRunning,
    /// Decoding or handling failed; the process and other bots are unaffected.
    Failed(String),
}

impl RouteOutcome {
    #[must_use]
    pub fn ok(&self) -> bool {
        matches!(self, Self::Handled | Self::Ignored)
    }
}

/// Single source of truth for which bots are live in this process.
///
/// The id → adapter mapping is mutated only through `start_bot` /
/// `stop_bot` / `restart_bot`; everything else takes a cloned adapter
/// handle out of the lock before doing any I/O.
pub struct BotRegistry {
    slots: Mutex<HashMap<String, BotSlot>>,
    factory: Arc<dyn AdapterFactory>,
    store: Arc<dyn ConversationStore>,
    handler: MessageHandler,
}

impl BotRegistry {
    pub fn new(
        factory: Arc<dyn AdapterFactory>,
        store: Arc<dyn ConversationStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let handler = MessageHandler::new(Arc::clone(&store), sink);
        Self {
            slots: Mutex::new(HashMap::new()),
            factory,
            store,
            handler,
        }
    }

    /// The adapter factory, exposed for webhook re-registration at the
    /// management boundary.
    #[must_use]
    pub fn factory(&self) -> &Arc<dyn AdapterFactory> {
        &self.factory
    }

    /// Start every active bot from the store, sequentially, continuing past
    /// individual failures. Called once on process start.
    pub async fn reconcile(&self) -> Result<()> {
        let bots = self.store.list_active_bots().await?;
        info!(count = bots.len(), "starting active bots");
        for bot in &bots {
            self.start_bot(bot).await;
        }
        Ok(())
    }

    /// Bring up a live adapter for `bot`. No-op with a warning when a slot
    /// already exists (guards double-start races). Construction failures
    /// are logged and leave the bot absent from the mapping — not running,
    /// not fatal.
    pub async fn start_bot(&self, bot: &Bot) {
        {
            let mut slots = self.slots.lock().await;
            if slots.contains_key(&bot.id) {
                warn!(bot_id = %bot.id, name = %bot.display_name, "bot already running");
                return;
            }
            slots.insert(bot.id.clone(), BotSlot::Pending);
        }

        match self.factory.connect(bot).await {
            Ok(adapter) => {
                let mut slots = self.slots.lock().await;
                match slots.get(&bot.id) {
                    Some(BotSlot::Pending) => {
                        slots.insert(bot.id.clone(), BotSlot::Live(adapter));
                        info!(bot_id = %bot.id, name = %bot.display_name, "bot started");
                    }
                    // Stopped while we were connecting; drop the adapter.
                    _ => {
                        warn!(bot_id = %bot.id, "bot stopped during startup, discarding adapter");
                    }
                }
            }
            Err(e) => {
                self.slots.lock().await.remove(&bot.id);
                error!(bot_id = %bot.id, name = %bot.display_name, error = %e, "failed to start bot");
            }
        }
    }

    /// Remove and discard the live adapter if present; idempotent. Never
    /// blocks on network calls — the transport is webhook-based, there is
    /// no polling loop to wind down.
    pub async fn stop_bot(&self, bot_id: &str) {
        let removed = self.slots.lock().await.remove(bot_id);
        if removed.is_some() {
            info!(bot_id, "bot stopped");
        } else {
            debug!(bot_id, "stop requested for bot that was not running");
        }
    }

    /// Stop, re-fetch current config, and start again if still active.
    /// Used after token rotation.
    pub async fn restart_bot(&self, bot_id: &str) -> Result<()> {
        self.stop_bot(bot_id).await;
        if let Some(bot) = self.store.bot(bot_id).await?
            && bot.is_active
        {
            self.start_bot(&bot).await;
        }
        Ok(())
    }

    /// Whether a live adapter exists for `bot_id`.
    pub async fn is_running(&self, bot_id: &str) -> bool {
        matches!(self.slots.lock().await.get(bot_id), Some(BotSlot::Live(_)))
    }

    /// Number of live adapters.
    pub async fn live_count(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| matches!(slot, BotSlot::Live(_)))
            .count()
    }

    fn live_adapter_locked(
        slots: &HashMap<String, BotSlot>,
        bot_id: &str,
    ) -> Option<Arc<dyn BotAdapter>> {
        match slots.get(bot_id) {
            Some(BotSlot::Live(adapter)) => Some(Arc::clone(adapter)),
            _ => None,
        }
    }

    async fn live_adapter(&self, bot_id: &str) -> Option<Arc<dyn BotAdapter>> {
        Self::live_adapter_locked(&*self.slots.lock().await, bot_id)
    }

    /// Route one raw webhook payload to the owning adapter. All failures are
    /// trapped into [`RouteOutcome`] — a malformed or adversarial payload
    /// must never crash the process or affect other bots.
    pub async fn route(&self, bot_id: &str, raw: serde_json::Value) -> RouteOutcome {
        let Some(adapter) = self.live_adapter(bot_id).await else {
            warn!(bot_id, "webhook for bot that is not running");
            return RouteOutcome::NotRunning;
        };

        let update = match adapter.decode(raw) {
            Ok(update) => update,
            Err(e) => {
                warn!(bot_id, error = %e, "failed to decode webhook payload");
                return RouteOutcome::Failed(format!("malformed update: {e}"));
            }
        };

        let dispatch = self.handler.handle_update(adapter.as_ref(), bot_id, update);
        match tokio::time::timeout(ROUTE_TIMEOUT, dispatch).await {
            Err(_) => {
                error!(bot_id, "webhook dispatch timed out");
                RouteOutcome::Failed("dispatch timed out".to_string())
            }
            Ok(Err(e)) => {
                error!(bot_id, error = %e, "webhook dispatch failed");
                RouteOutcome::Failed(e.to_string())
            }
            Ok(Ok(None)) => RouteOutcome::Ignored,
            Ok(Ok(Some(outcome))) => {
                // Best-effort fan-out; never part of delivery correctness.
                self.notify_agents(bot_id, &outcome.agent_summary).await;
                RouteOutcome::Handled
            }
        }
    }

    /// Agent-initiated reply to an end user through the bot's adapter.
    pub async fn send_to_end_user(
        &self,
        bot_id: &str,
        end_user_id: &str,
        content: String,
        photo_ref: Option<String>,
    ) -> Result<MessageRecord> {
        let adapter = self
            .live_adapter(bot_id)
            .await
            .ok_or_else(|| RegistryError::not_running(bot_id))?;
        self.handler
            .handle_outbound(adapter.as_ref(), bot_id, end_user_id, content, photo_ref)
            .await
    }

    /// Push `text` to every assigned agent's personal Telegram chat through
    /// the bot's own adapter. Each send is attempted independently: one
    /// agent having blocked the bot must not prevent notifying the others.
    /// Failures are logged, never surfaced to the caller.
    pub async fn notify_agents(&self, bot_id: &str, text: &str) {
        let Some(adapter) = self.live_adapter(bot_id).await else {
            warn!(bot_id, "cannot notify agents: bot not running");
            return;
        };

        let assignments = match self.store.assignments_for_bot(bot_id).await {
            Ok(assignments) => assignments,
            Err(e) => {
                error!(bot_id, error = %e, "failed to load assignments for notification");
                return;
            }
        };

        if assignments.is_empty() {
            debug!(bot_id, "no agents assigned, skipping notification");
            return;
        }

        for assignment in assignments {
            let Some(chat) = assignment
                .telegram_notification_id
                .as_deref()
                .filter(|s| !s.is_empty())
            else {
                debug!(
                    bot_id,
                    agent_id = %assignment.agent_id,
                    "assignment has no notification chat id, skipping"
                );
                continue;
            };
            let Ok(chat_id) = chat.parse::<i64>() else {
                warn!(
                    bot_id,
                    agent_id = %assignment.agent_id,
                    chat_id = chat,
                    "invalid notification chat id, skipping"
                );
                continue;
            };
            if let Err(e) = adapter.send_text(chat_id, text).await {
                warn!(
                    bot_id,
                    agent_id = %assignment.agent_id,
                    chat_id,
                    error = %e,
                    "failed to notify agent"
                );
            }
        }
    }
}
