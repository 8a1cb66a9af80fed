use async_trait::async_trait;
use teloxide::{payloads::SendMessageSetters, prelude::*, types::ParseMode};
use tracing::debug;

use common::{AlertSink, Error, Result};

/// Posts HTML messages to the configured alert chat.
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramSink {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self {
            bot: Bot::new(token),
            chat_id: ChatId(chat_id),
        }
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    async fn post_message(&self, text: &str) -> Result<()> {
        self.bot
            .send_message(self.chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| Error::Notify(e.to_string()))?;
        debug!(chat_id = self.chat_id.0, "Message delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_configured_chat() {
        let sink = TelegramSink::new("123:abc", -1001234567890);
        assert_eq!(sink.chat_id, ChatId(-1001234567890));
    }
}
