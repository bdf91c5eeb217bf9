use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    teloxide::prelude::*,
    tracing::{info, warn},
    url::Url,
};

use {
    botdesk_registry::{AdapterFactory, BotAdapter},
    botdesk_store::Bot as BotRecord,
};

use crate::adapter::TelegramAdapter;

/// Builds authenticated [`TelegramAdapter`]s and points Telegram's webhook
/// delivery at this process.
pub struct TelegramAdapterFactory {
    uploads_dir: PathBuf,
    public_base_url: Url,
}

impl TelegramAdapterFactory {
    pub fn new(uploads_dir: impl Into<PathBuf>, public_base_url: Url) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            public_base_url,
        }
    }

    fn client() -> Result<reqwest::Client> {
        // Give the API client headroom over Telegram's own server-side
        // timeouts so slow file transfers are not cut short locally.
        teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(45))
            .build()
            .context("building telegram http client")
    }

    fn webhook_url(&self, bot_id: &str) -> Result<Url> {
        self.public_base_url
            .join(&format!("api/telegram/webhook/{bot_id}"))
            .context("building webhook url")
    }
}

#[async_trait]
impl AdapterFactory for TelegramAdapterFactory {
    /// Token validation happens here: `get_me` fails fast on a revoked or
    /// mistyped token, which the registry treats as a construction failure.
    async fn connect(&self, record: &BotRecord) -> Result<Arc<dyn BotAdapter>> {
        let bot = Bot::with_client(&record.secret_token, Self::client()?);
        let me = bot.get_me().await.context("verifying bot token")?;
        info!(
            bot_id = %record.id,
            name = %record.display_name,
            username = ?me.username,
            "telegram bot authenticated"
        );
        Ok(Arc::new(TelegramAdapter::new(
            bot,
            record.id.clone(),
            self.uploads_dir.clone(),
        )))
    }

    /// Best-effort: a bot whose webhook registration fails still runs, it
    /// just receives no traffic until the webhook is fixed.
    async fn register_webhook(&self, record: &BotRecord) {
        let url = match self.webhook_url(&record.id) {
            Ok(url) => url,
            Err(e) => {
                warn!(bot_id = %record.id, error = %e, "invalid webhook url");
                return;
            }
        };
        let client = match Self::client() {
            Ok(client) => client,
            Err(e) => {
                warn!(bot_id = %record.id, error = %e, "failed to build webhook client");
                return;
            }
        };
        let bot = Bot::with_client(&record.secret_token, client);
        match bot.set_webhook(url.clone()).await {
            Ok(_) => info!(bot_id = %record.id, %url, "webhook registered"),
            Err(e) => warn!(bot_id = %record.id, %url, error = %e, "failed to register webhook"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn webhook_url_embeds_bot_id() {
        let factory = TelegramAdapterFactory::new(
            "/tmp/uploads",
            Url::parse("https://dash.example.com/").unwrap(),
        );
        let url = factory.webhook_url("bot-7").unwrap();
        assert_eq!(
            url.as_str(),
            "https://dash.example.com/api/telegram/webhook/bot-7"
        );
    }
}
