use async_trait::async_trait;

use crate::Result;

/// The single outbound chat channel alerts are delivered to.
///
/// `TelegramSink` implements this for production. Only the engine's
/// `Notifier` and the process wiring post through it.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one pre-rendered HTML message.
    async fn post_message(&self, text: &str) -> Result<()>;
}
