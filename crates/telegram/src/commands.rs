use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use teloxide::{
    dispatching::UpdateHandler,
    payloads::SendMessageSetters,
    prelude::*,
    types::ParseMode,
    update_listeners::Polling,
    utils::command::BotCommands,
};
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use common::logfile::{daily_log_path, tail_lines};
use common::{DataSource, EngineCommand, EngineState, SignalStats, Timeframe};

use crate::replies::{
    help_text, logs_text, status_text, unknown_text, welcome_text, StatusView, LOG_TAIL_LINES,
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Long-poll wait per `getUpdates` call.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub command_tx: mpsc::Sender<EngineCommand>,
    pub engine_state: Arc<RwLock<EngineState>>,
    pub stats: Arc<SignalStats>,
    pub symbols: Arc<Vec<String>>,
    pub timeframes: Arc<Vec<Timeframe>>,
    pub data_source: DataSource,
    pub log_dir: PathBuf,
    /// The only chat whose commands are honoured.
    pub chat_id: ChatId,
    pub utc_offset_hours: i32,
}

/// Commands accepted from the alert chat.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "SignalBot commands:")]
pub enum Command {
    #[command(description = "Start the bot and show welcome")]
    Start,
    #[command(description = "Show bot status and statistics")]
    Status,
    #[command(description = "Get recent logs (last 10 lines)")]
    Logs,
    #[command(description = "Stop the bot")]
    Stop,
    #[command(description = "Show this help message")]
    Help,
}

/// Run the command listener in long-polling mode until Ctrl+C.
pub async fn start_bot(token: String, deps: BotDeps) {
    let bot = Bot::new(token);
    let deps = Arc::new(deps);

    info!(chat_id = deps.chat_id.0, "Telegram command polling started");

    let listener = Polling::builder(bot.clone())
        .timeout(POLL_TIMEOUT)
        .delete_webhook()
        .await
        .build();

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("Telegram update listener error"),
        )
        .await;

    info!("Telegram command polling stopped");
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_start))
        .branch(case![Command::Status].endpoint(handle_status))
        .branch(case![Command::Logs].endpoint(handle_logs))
        .branch(case![Command::Stop].endpoint(handle_stop))
        .branch(case![Command::Help].endpoint(handle_help));

    let unknown_handler = dptree::filter(|msg: Message| looks_like_command(msg.text()))
        .endpoint(handle_unknown);

    Update::filter_message()
        .filter_async(auth_filter)
        .branch(command_handler)
        .branch(unknown_handler)
}

fn looks_like_command(text: Option<&str>) -> bool {
    text.is_some_and(|t| t.trim_start().starts_with('/'))
}

/// Drop messages from any chat other than the configured one.
async fn auth_filter(msg: Message, deps: Arc<BotDeps>) -> bool {
    let allowed = msg.chat.id == deps.chat_id;
    if !allowed {
        warn!(chat_id = msg.chat.id.0, "Ignoring command from unauthorized chat");
    }
    allowed
}

async fn reply(bot: &Bot, chat_id: ChatId, text: String) -> HandlerResult {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn handle_start(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = *deps.engine_state.read().await;
    if state == EngineState::Stopped {
        info!("Start requested from Telegram");
        let _ = deps.command_tx.send(EngineCommand::Start).await;
    }
    reply(&bot, msg.chat.id, welcome_text()).await
}

async fn handle_status(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = *deps.engine_state.read().await;
    let view = StatusView {
        state,
        symbols: &deps.symbols,
        timeframes: &deps.timeframes,
        signals_sent: deps.stats.signals_sent(),
        last_analysis: deps.stats.last_tick(),
        data_source: deps.data_source,
        utc_offset_hours: deps.utc_offset_hours,
    };
    reply(&bot, msg.chat.id, status_text(&view)).await
}

async fn handle_logs(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let path = daily_log_path(&deps.log_dir, Utc::now().date_naive());
    let text = match tail_lines(&path, LOG_TAIL_LINES) {
        Ok(tail) => logs_text(tail.as_deref()),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read log file");
            "❌ Error getting logs".to_string()
        }
    };
    reply(&bot, msg.chat.id, text).await
}

async fn handle_stop(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = *deps.engine_state.read().await;
    if state == EngineState::Stopped {
        return reply(&bot, msg.chat.id, "Bot is already stopped. Use /start to resume.".into()).await;
    }
    info!("Stop requested from Telegram");
    let _ = deps.command_tx.send(EngineCommand::Stop).await;
    reply(&bot, msg.chat.id, "🛑 Bot stopped successfully".into()).await
}

async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    reply(&bot, msg.chat.id, help_text()).await
}

async fn handle_unknown(bot: Bot, msg: Message) -> HandlerResult {
    let command = msg
        .text()
        .and_then(|t| t.split_whitespace().next())
        .unwrap_or_default()
        .to_lowercase();
    reply(&bot, msg.chat.id, unknown_text(&command)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("/status", "signalbot").unwrap(), Command::Status);
        assert_eq!(Command::parse("/logs", "signalbot").unwrap(), Command::Logs);
        assert_eq!(Command::parse("/stop@signalbot", "signalbot").unwrap(), Command::Stop);
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(Command::parse("/resetdrawdown", "signalbot").is_err());
        assert!(looks_like_command(Some("/resetdrawdown")));
        assert!(!looks_like_command(Some("hello")));
        assert!(!looks_like_command(None));
    }
}
