use {anyhow::Result, async_trait::async_trait, std::sync::Arc};

use botdesk_store::Bot;

/// Identity fields of the remote person behind an inbound update, as
/// reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub external_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl SenderIdentity {
    /// "First Last" with missing parts trimmed away; falls back to the
    /// username when both name fields are empty.
    #[must_use]
    pub fn display_name(&self) -> String {
        let last = self.last_name.as_deref().unwrap_or("");
        let name = format!("{} {last}", self.first_name).trim().to_string();
        if name.is_empty() {
            self.username.clone().unwrap_or_else(|| "User".to_string())
        } else {
            name
        }
    }
}

/// A raw webhook payload decoded into exactly one variant at the adapter
/// boundary. Downstream code dispatches on this and never re-inspects the
/// raw shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundUpdate {
    /// The `/start` command opening a conversation.
    Start { sender: SenderIdentity },
    /// A plain text message.
    Text { sender: SenderIdentity, text: String },
    /// A photo message; `file_id` names the largest available resolution.
    Photo {
        sender: SenderIdentity,
        file_id: String,
        caption: Option<String>,
    },
    /// Anything the system does not handle (stickers, edits, joins, …).
    Other,
}

/// Live, token-authenticated client for one bot.
///
/// One instance exists per registered active bot; the registry is the only
/// owner of the id → adapter mapping.
#[async_trait]
pub trait BotAdapter: Send + Sync {
    /// Decode a raw transport payload into an [`InboundUpdate`].
    fn decode(&self, raw: serde_json::Value) -> Result<InboundUpdate>;

    /// Send a plain text message to a chat.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Send a photo with caption, applying the photo source policy
    /// (local upload → streamed file, absolute URL → passed through,
    /// anything else → text-only send).
    async fn send_photo(&self, chat_id: i64, photo_ref: &str, caption: &str) -> Result<()>;

    /// Download a transport-hosted photo into the local upload area and
    /// return its local reference (`/uploads/...`).
    async fn download_photo(&self, file_id: &str) -> Result<String>;
}

/// Constructs adapters for the registry and registers webhooks with the
/// external transport.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    /// Build and authenticate an adapter for `bot`. Errors here are the
    /// construction-failure path: the registry logs them and leaves the bot
    /// absent from the live mapping.
    async fn connect(&self, bot: &Bot) -> Result<Arc<dyn BotAdapter>>;

    /// Point the external transport's webhook at this process. Best-effort;
    /// implementations log failures and never propagate them.
    async fn register_webhook(&self, bot: &Bot) {
        let _ = bot;
    }
}

/// Classification of an outbound `photo_ref` string.
///
/// The upload collaborator produces `/uploads/...` refs; dashboards may also
/// paste absolute URLs. Arbitrary other strings degrade to a text-only send
/// rather than being guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSource {
    LocalUpload,
    Url,
    Opaque,
}

impl PhotoSource {
    #[must_use]
    pub fn classify(photo_ref: &str) -> Self {
        if photo_ref.starts_with("/uploads/") {
            Self::LocalUpload
        } else if photo_ref.starts_with("http://") || photo_ref.starts_with("https://") {
            Self::Url
        } else {
            Self::Opaque
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_joins_and_trims() {
        let sender = SenderIdentity {
            external_id: 1,
            first_name: "Ada".into(),
            last_name: Some("Lovelace".into()),
            username: None,
        };
        assert_eq!(sender.display_name(), "Ada Lovelace");

        let first_only = SenderIdentity {
            last_name: None,
            ..sender.clone()
        };
        assert_eq!(first_only.display_name(), "Ada");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let sender = SenderIdentity {
            external_id: 1,
            first_name: String::new(),
            last_name: None,
            username: Some("ada".into()),
        };
        assert_eq!(sender.display_name(), "ada");
    }

    #[test]
    fn photo_source_classification() {
        assert_eq!(
            PhotoSource::classify("/uploads/telegram-b1-f1.jpg"),
            PhotoSource::LocalUpload
        );
        assert_eq!(
            PhotoSource::classify("https://example.com/a.png"),
            PhotoSource::Url
        );
        assert_eq!(
            PhotoSource::classify("http://example.com/a.png"),
            PhotoSource::Url
        );
        assert_eq!(PhotoSource::classify("data:image/png;base64,xyz"), PhotoSource::Opaque);
        assert_eq!(PhotoSource::classify("uploads/a.jpg"), PhotoSource::Opaque);
    }
}
