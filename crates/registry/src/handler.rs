use std::sync::Arc;

use tracing::{debug, info};

use {
    botdesk_common::MessageSender,
    botdesk_store::{ConversationStore, EndUser, MessageRecord, NewEndUser, NewMessage, StoreError},
};

use crate::{
    adapter::{BotAdapter, InboundUpdate, SenderIdentity},
    error::{RegistryError, Result},
    events::{EventSink, NewMessageEvent},
};

/// Fixed reply to `/start`.
pub const WELCOME_TEXT: &str = "Welcome to live chat support! 👋\n\n\
     Type your message and one of our agents will reply shortly.";

/// Content stored for a photo message without a caption.
pub const PHOTO_PLACEHOLDER: &str = "[Photo]";

/// Result of handling one inbound message: the persisted row plus the
/// formatted summary the registry fans out to assigned agents.
#[derive(Debug, Clone)]
pub struct InboundOutcome {
    pub message: MessageRecord,
    pub agent_summary: String,
}

/// Translates decoded transport updates into persisted messages and side
/// effects, independent of any specific bot transport.
pub struct MessageHandler {
    store: Arc<dyn ConversationStore>,
    sink: Arc<dyn EventSink>,
}

impl MessageHandler {
    pub fn new(store: Arc<dyn ConversationStore>, sink: Arc<dyn EventSink>) -> Self {
        Self { store, sink }
    }

    /// Dispatch one decoded update. Returns the inbound outcome for
    /// message-bearing variants, `None` for `/start` and ignored kinds.
    pub async fn handle_update(
        &self,
        adapter: &dyn BotAdapter,
        bot_id: &str,
        update: InboundUpdate,
    ) -> Result<Option<InboundOutcome>> {
        match update {
            InboundUpdate::Start { sender } => {
                self.handle_start(adapter, bot_id, sender).await?;
                Ok(None)
            }
            InboundUpdate::Text { sender, text } => {
                let outcome = self.handle_inbound(bot_id, sender, text, None).await?;
                Ok(Some(outcome))
            }
            InboundUpdate::Photo {
                sender,
                file_id,
                caption,
            } => {
                // Largest resolution was selected at decode time; pull it
                // into the local upload area before persisting.
                let photo_ref = adapter
                    .download_photo(&file_id)
                    .await
                    .map_err(|e| RegistryError::transport("photo download", e))?;
                let content = caption
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| PHOTO_PLACEHOLDER.to_string());
                let outcome = self
                    .handle_inbound(bot_id, sender, content, Some(photo_ref))
                    .await?;
                Ok(Some(outcome))
            }
            InboundUpdate::Other => {
                debug!(bot_id, "ignoring unhandled update kind");
                Ok(None)
            }
        }
    }

    /// `/start`: make sure the end user exists, send the welcome reply. No
    /// message row is created for the command itself.
    pub async fn handle_start(
        &self,
        adapter: &dyn BotAdapter,
        bot_id: &str,
        sender: SenderIdentity,
    ) -> Result<()> {
        let user = self.find_or_create_user(bot_id, &sender).await?;
        adapter
            .send_text(user.external_id, WELCOME_TEXT)
            .await
            .map_err(|e| RegistryError::transport("welcome reply", e))?;
        Ok(())
    }

    /// Persist one inbound end-user message and publish it to the realtime
    /// notifier. Returns the agent summary for notification fan-out.
    pub async fn handle_inbound(
        &self,
        bot_id: &str,
        sender: SenderIdentity,
        content: String,
        photo_ref: Option<String>,
    ) -> Result<InboundOutcome> {
        let user = self.find_or_create_user(bot_id, &sender).await?;
        self.store.touch_end_user(&user.id).await?;

        // Invariant: message.bot_id always equals its end user's bot_id.
        let message = self
            .store
            .create_message(NewMessage {
                content,
                sender: MessageSender::EndUser,
                is_read: false,
                photo_ref,
                user_id: user.id.clone(),
                bot_id: user.bot_id.clone(),
            })
            .await?;

        info!(
            bot_id,
            user_id = %user.id,
            external_id = user.external_id,
            "inbound message persisted"
        );

        self.sink
            .publish_new_message(NewMessageEvent {
                message: message.clone(),
                user: (&user).into(),
            })
            .await;

        let agent_summary = format_agent_summary(&sender, &message.content);
        Ok(InboundOutcome {
            message,
            agent_summary,
        })
    }

    /// Agent reply: send through the transport first, persist only on
    /// transport success — a reply is never recorded as sent if the
    /// transport rejected it.
    pub async fn handle_outbound(
        &self,
        adapter: &dyn BotAdapter,
        bot_id: &str,
        end_user_id: &str,
        content: String,
        photo_ref: Option<String>,
    ) -> Result<MessageRecord> {
        let user = self
            .store
            .end_user(end_user_id)
            .await?
            .ok_or(RegistryError::not_found("end user"))?;
        if user.bot_id != bot_id {
            // A mismatched bot looks identical to a missing user.
            return Err(RegistryError::not_found("end user"));
        }

        match &photo_ref {
            Some(r) => adapter.send_photo(user.external_id, r, &content).await,
            None => adapter.send_text(user.external_id, &content).await,
        }
        .map_err(RegistryError::send_failed)?;

        let message = self
            .store
            .create_message(NewMessage {
                content,
                sender: MessageSender::Agent,
                is_read: true,
                photo_ref,
                user_id: user.id.clone(),
                bot_id: user.bot_id.clone(),
            })
            .await?;
        Ok(message)
    }

    /// Lazily create the end user on first contact. Loses gracefully if a
    /// concurrent delivery created the row between the lookup and insert.
    async fn find_or_create_user(
        &self,
        bot_id: &str,
        sender: &SenderIdentity,
    ) -> Result<EndUser> {
        if let Some(user) = self.store.find_end_user(bot_id, sender.external_id).await? {
            return Ok(user);
        }
        match self
            .store
            .create_end_user(NewEndUser {
                external_id: sender.external_id,
                first_name: sender.first_name.clone(),
                last_name: sender.last_name.clone(),
                username: sender.username.clone(),
                bot_id: bot_id.to_string(),
            })
            .await
        {
            Ok(user) => Ok(user),
            Err(StoreError::Conflict { .. }) => self
                .store
                .find_end_user(bot_id, sender.external_id)
                .await?
                .ok_or(RegistryError::not_found("end user")),
            Err(e) => Err(e.into()),
        }
    }
}

/// Notification text pushed to assigned agents' personal Telegram chats.
fn format_agent_summary(sender: &SenderIdentity, text: &str) -> String {
    format!(
        "New message from {}!\n\nTelegram ID: {}\nUsername: @{}\nMessage: {}",
        sender.display_name(),
        sender.external_id,
        sender.username.as_deref().unwrap_or("N/A"),
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_summary_includes_identity_and_text() {
        let sender = SenderIdentity {
            external_id: 555,
            first_name: "Ada".into(),
            last_name: None,
            username: Some("ada".into()),
        };
        let summary = format_agent_summary(&sender, "Hi");
        assert!(summary.contains("Ada"));
        assert!(summary.contains("555"));
        assert!(summary.contains("@ada"));
        assert!(summary.contains("Message: Hi"));
    }

    #[test]
    fn agent_summary_handles_missing_username() {
        let sender = SenderIdentity {
            external_id: 9,
            first_name: "Grace".into(),
            last_name: Some("Hopper".into()),
            username: None,
        };
        let summary = format_agent_summary(&sender, "hello");
        assert!(summary.contains("@N/A"));
        assert!(summary.contains("Grace Hopper"));
    }
}
