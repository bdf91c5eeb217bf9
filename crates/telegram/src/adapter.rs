use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result, anyhow},
    async_trait::async_trait,
    teloxide::{
        payloads::SendPhotoSetters,
        prelude::*,
        types::{ChatId, InputFile, MediaKind, Message, MessageKind, Update, UpdateKind},
    },
    tracing::{debug, warn},
};

use botdesk_registry::{BotAdapter, InboundUpdate, PhotoSource, SenderIdentity};

/// Live teloxide client for one registered bot.
pub struct TelegramAdapter {
    pub(crate) bot: Bot,
    pub(crate) bot_id: String,
    pub(crate) uploads_dir: PathBuf,
}

impl TelegramAdapter {
    pub fn new(bot: Bot, bot_id: impl Into<String>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            bot,
            bot_id: bot_id.into(),
            uploads_dir: uploads_dir.into(),
        }
    }
}

#[async_trait]
impl BotAdapter for TelegramAdapter {
    fn decode(&self, raw: serde_json::Value) -> Result<InboundUpdate> {
        let update: Update =
            serde_json::from_value(raw).context("payload is not a telegram update")?;
        match update.kind {
            UpdateKind::Message(msg) => Ok(decode_message(&msg)),
            _ => Ok(InboundUpdate::Other),
        }
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, photo_ref: &str, caption: &str) -> Result<()> {
        let input = match PhotoSource::classify(photo_ref) {
            PhotoSource::LocalUpload => {
                let filename = photo_ref.trim_start_matches("/uploads/");
                InputFile::file(self.uploads_dir.join(filename))
            }
            PhotoSource::Url => InputFile::url(photo_ref.parse()?),
            PhotoSource::Opaque => {
                // Unknown reference shape: deliver the caption as text rather
                // than failing the whole reply.
                warn!(
                    bot_id = %self.bot_id,
                    photo_ref,
                    "unrecognized photo reference, sending caption as text"
                );
                return self.send_text(chat_id, caption).await;
            }
        };
        let mut req = self.bot.send_photo(ChatId(chat_id), input);
        if !caption.is_empty() {
            req = req.caption(caption);
        }
        req.await?;
        Ok(())
    }

    /// Pull a transport-hosted photo into the upload area. The stored name
    /// embeds the bot id and file id so repeated downloads overwrite rather
    /// than accumulate.
    async fn download_photo(&self, file_id: &str) -> Result<String> {
        let file = self.bot.get_file(file_id).await?;
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        );
        let response = reqwest::get(&url).await?;
        if !response.status().is_success() {
            return Err(anyhow!("file download returned HTTP {}", response.status()));
        }
        let bytes = response.bytes().await?;

        let filename = upload_filename(&self.bot_id, file_id, &file.path);
        tokio::fs::create_dir_all(&self.uploads_dir).await?;
        tokio::fs::write(self.uploads_dir.join(&filename), &bytes).await?;
        debug!(bot_id = %self.bot_id, filename, size = bytes.len(), "photo downloaded");
        Ok(format!("/uploads/{filename}"))
    }
}

fn decode_message(msg: &Message) -> InboundUpdate {
    let Some(sender) = msg.from.as_ref().map(sender_identity) else {
        // Channel posts and service messages carry no sender.
        return InboundUpdate::Other;
    };
    let MessageKind::Common(common) = &msg.kind else {
        return InboundUpdate::Other;
    };
    match &common.media_kind {
        MediaKind::Text(t) if is_start_command(&t.text) => InboundUpdate::Start { sender },
        MediaKind::Text(t) => InboundUpdate::Text {
            sender,
            text: t.text.clone(),
        },
        MediaKind::Photo(p) => match p.photo.last() {
            // Sizes are ordered smallest to largest; keep the largest.
            Some(size) => InboundUpdate::Photo {
                sender,
                file_id: size.file.id.clone(),
                caption: p.caption.clone(),
            },
            None => InboundUpdate::Other,
        },
        _ => InboundUpdate::Other,
    }
}

fn sender_identity(user: &teloxide::types::User) -> SenderIdentity {
    SenderIdentity {
        external_id: user.id.0 as i64,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
    }
}

/// `/start` possibly carrying a deep-link payload or `@botname` suffix.
fn is_start_command(text: &str) -> bool {
    let Some(rest) = text.strip_prefix("/start") else {
        return false;
    };
    rest.is_empty() || rest.starts_with(' ') || rest.starts_with('@')
}

/// Stable on-disk name for a downloaded photo, keeping the remote file's
/// extension when it has one.
fn upload_filename(bot_id: &str, file_id: &str, remote_path: &str) -> String {
    let ext = Path::new(remote_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("jpg");
    format!("telegram-{bot_id}-{file_id}.{ext}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {rstest::rstest, serde_json::json};

    use super::*;

    fn decode(raw: serde_json::Value) -> InboundUpdate {
        let update: Update = serde_json::from_value(raw).unwrap();
        match update.kind {
            UpdateKind::Message(msg) => decode_message(&msg),
            _ => InboundUpdate::Other,
        }
    }

    fn text_update(text: &str) -> serde_json::Value {
        json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "date": 1_700_000_000,
                "chat": { "id": 42, "type": "private", "first_name": "Ada" },
                "from": {
                    "id": 42,
                    "is_bot": false,
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "username": "ada"
                },
                "text": text
            }
        })
    }

    #[test]
    fn text_message_decodes_with_sender_identity() {
        let InboundUpdate::Text { sender, text } = decode(text_update("need help")) else {
            panic!("expected text update");
        };
        assert_eq!(text, "need help");
        assert_eq!(sender.external_id, 42);
        assert_eq!(sender.first_name, "Ada");
        assert_eq!(sender.username.as_deref(), Some("ada"));
    }

    #[rstest]
    #[case("/start")]
    #[case("/start ref-123")]
    #[case("/start@support_bot")]
    fn start_variants_decode_as_start(#[case] text: &str) {
        assert!(matches!(decode(text_update(text)), InboundUpdate::Start { .. }));
    }

    #[test]
    fn startling_text_is_not_a_start_command() {
        assert!(matches!(
            decode(text_update("/startle")),
            InboundUpdate::Text { .. }
        ));
    }

    #[test]
    fn photo_decodes_to_largest_size() {
        let raw = json!({
            "update_id": 2,
            "message": {
                "message_id": 11,
                "date": 1_700_000_000,
                "chat": { "id": 42, "type": "private", "first_name": "Ada" },
                "from": { "id": 42, "is_bot": false, "first_name": "Ada" },
                "photo": [
                    { "file_id": "small", "file_unique_id": "u1", "width": 90, "height": 90 },
                    { "file_id": "large", "file_unique_id": "u2", "width": 800, "height": 600 }
                ],
                "caption": "broken screen"
            }
        });
        let InboundUpdate::Photo {
            file_id, caption, ..
        } = decode(raw)
        else {
            panic!("expected photo update");
        };
        assert_eq!(file_id, "large");
        assert_eq!(caption.as_deref(), Some("broken screen"));
    }

    #[test]
    fn sticker_is_ignored() {
        let raw = json!({
            "update_id": 3,
            "message": {
                "message_id": 12,
                "date": 1_700_000_000,
                "chat": { "id": 42, "type": "private", "first_name": "Ada" },
                "from": { "id": 42, "is_bot": false, "first_name": "Ada" },
                "sticker": {
                    "file_id": "s1",
                    "file_unique_id": "su1",
                    "type": "regular",
                    "width": 512,
                    "height": 512,
                    "is_animated": false,
                    "is_video": false
                }
            }
        });
        assert_eq!(decode(raw), InboundUpdate::Other);
    }

    #[test]
    fn non_message_update_is_ignored() {
        let raw = json!({
            "update_id": 4,
            "edited_message": {
                "message_id": 13,
                "date": 1_700_000_000,
                "edit_date": 1_700_000_100,
                "chat": { "id": 42, "type": "private", "first_name": "Ada" },
                "from": { "id": 42, "is_bot": false, "first_name": "Ada" },
                "text": "edited"
            }
        });
        assert_eq!(decode(raw), InboundUpdate::Other);
    }

    #[rstest]
    #[case("photos/file_7.jpg", "telegram-b1-f1.jpg")]
    #[case("photos/file_7.png", "telegram-b1-f1.png")]
    #[case("photos/file_7", "telegram-b1-f1.jpg")]
    fn upload_filenames_keep_remote_extension(#[case] remote: &str, #[case] expected: &str) {
        assert_eq!(upload_filename("b1", "f1", remote), expected);
    }
}
