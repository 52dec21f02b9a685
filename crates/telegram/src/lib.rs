use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::Recipient;
use tracing::{debug, warn};

use common::{Error, Notifier, Result};

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends signal messages to a single Telegram chat.
pub struct TelegramNotifier {
    bot: Bot,
    recipient: Recipient,
}

impl TelegramNotifier {
    /// `chat` is either a numeric chat id or an `@channel` username.
    pub fn new(token: impl Into<String>, chat: &str) -> Result<Self> {
        let recipient = parse_recipient(chat)?;
        let client = teloxide::net::default_reqwest_settings()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build Telegram client: {e}")))?;
        Ok(Self {
            bot: Bot::with_client(token, client),
            recipient,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        debug!(chat = ?self.recipient, "Sending Telegram message");
        self.bot
            .send_message(self.recipient.clone(), text)
            .await
            .map_err(|e| {
                warn!(chat = ?self.recipient, error = %e, "Failed to send Telegram message");
                Error::Delivery(e.to_string())
            })?;
        Ok(())
    }
}

/// Numeric ids map to chats, `@name` to public channels.
pub fn parse_recipient(chat: &str) -> Result<Recipient> {
    let chat = chat.trim();
    if let Ok(id) = chat.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    if chat.starts_with('@') && chat.len() > 1 {
        return Ok(Recipient::ChannelUsername(chat.to_string()));
    }
    Err(Error::Config(format!(
        "TELEGRAM_CHAT_ID must be a numeric id or an @channel name, got: '{chat}'"
    )))
}
