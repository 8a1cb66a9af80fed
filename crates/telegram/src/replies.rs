//! Reply texts for the command surface. Pure functions so they can be
//! tested without a bot.

use chrono::{DateTime, FixedOffset, Utc};
use teloxide::utils::command::BotCommands;
use teloxide::utils::html::escape;

use common::{DataSource, EngineState, Timeframe};

use crate::Command;

/// Lines of today's log file returned by `/logs`.
pub const LOG_TAIL_LINES: usize = 10;

pub fn welcome_text() -> String {
    format!(
        "🤖 <b>Trading Bot Started</b>\n\n\
         Available commands:\n\
         /status - Bot status and statistics\n\
         /logs - Recent logs (last {LOG_TAIL_LINES} lines)\n\
         /stop - Stop the bot\n\
         /help - Show this help message\n\n\
         Bot is now monitoring markets and will send signals when patterns are detected."
    )
}

pub fn help_text() -> String {
    format!(
        "📖 <b>Available Commands</b>\n\n{}\n\n\
         The bot automatically analyzes markets and sends trading signals when patterns are detected.",
        escape(&Command::descriptions().to_string())
    )
}

/// Everything `/status` reports, gathered by the handler.
pub struct StatusView<'a> {
    pub state: EngineState,
    pub symbols: &'a [String],
    pub timeframes: &'a [Timeframe],
    pub signals_sent: u64,
    pub last_analysis: Option<DateTime<Utc>>,
    pub data_source: DataSource,
    pub utc_offset_hours: i32,
}

pub fn status_text(view: &StatusView<'_>) -> String {
    let icon = match view.state {
        EngineState::Running => "🟢",
        EngineState::Stopped => "🔴",
    };
    let timeframes: Vec<String> = view.timeframes.iter().map(Timeframe::to_string).collect();
    let last = match (view.last_analysis, FixedOffset::east_opt(view.utc_offset_hours * 3600)) {
        (Some(at), Some(offset)) => at.with_timezone(&offset).format("%H:%M:%S").to_string(),
        (Some(at), None) => at.format("%H:%M:%S").to_string(),
        (None, _) => "never".to_string(),
    };
    format!(
        "📊 <b>Bot Status</b>\n\n\
         {icon} Status: {state}\n\
         📈 Symbols: {symbols}\n\
         ⏰ Timeframes: {timeframes}\n\
         📨 Signals Sent: {sent}\n\
         🕐 Last Analysis: {last}\n\n\
         💡 Using {source} market data",
        state = view.state,
        symbols = view.symbols.len(),
        timeframes = timeframes.join(", "),
        sent = view.signals_sent,
        source = view.data_source,
    )
}

/// `tail` is the end of today's log file, or `None` when there is none yet.
pub fn logs_text(tail: Option<&str>) -> String {
    match tail {
        Some(lines) if !lines.is_empty() => {
            format!("📋 <b>Recent Logs</b>\n\n<code>{}</code>", escape(lines))
        }
        _ => "📋 <b>Recent Logs</b>\n\nNo logs found for today".to_string(),
    }
}

pub fn unknown_text(command: &str) -> String {
    format!(
        "❓ Unknown command: {}\nUse /help for available commands.",
        escape(command)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_lists_counts_and_source() {
        let symbols = vec!["EURUSD".to_string(), "GBPUSD".to_string(), "XAUUSD".to_string()];
        let view = StatusView {
            state: EngineState::Running,
            symbols: &symbols,
            timeframes: &[Timeframe::M5, Timeframe::M15],
            signals_sent: 12,
            last_analysis: Some(Utc.with_ymd_and_hms(2024, 3, 1, 2, 5, 9).unwrap()),
            data_source: DataSource::Live,
            utc_offset_hours: 7,
        };
        let text = status_text(&view);
        assert!(text.contains("🟢 Status: RUNNING"));
        assert!(text.contains("Symbols: 3"));
        assert!(text.contains("Timeframes: 5m, 15m"));
        assert!(text.contains("Signals Sent: 12"));
        assert!(text.contains("Last Analysis: 09:05:09"));
        assert!(text.contains("Using REAL market data"));
    }

    #[test]
    fn status_before_first_tick() {
        let view = StatusView {
            state: EngineState::Stopped,
            symbols: &[],
            timeframes: &[Timeframe::H1],
            signals_sent: 0,
            last_analysis: None,
            data_source: DataSource::Synthetic,
            utc_offset_hours: 0,
        };
        let text = status_text(&view);
        assert!(text.contains("🔴 Status: STOPPED"));
        assert!(text.contains("Last Analysis: never"));
        assert!(text.contains("Using SAMPLE market data"));
    }

    #[test]
    fn logs_are_escaped_inside_code_block() {
        let text = logs_text(Some("INFO a < b & c"));
        assert!(text.contains("<code>INFO a &lt; b &amp; c</code>"));
    }

    #[test]
    fn missing_log_file() {
        assert!(logs_text(None).contains("No logs found for today"));
        assert!(logs_text(Some("")).contains("No logs found for today"));
    }

    #[test]
    fn help_lists_every_command() {
        let text = help_text();
        for cmd in ["/start", "/status", "/logs", "/stop", "/help"] {
            assert!(text.contains(cmd), "missing {cmd}");
        }
    }

    #[test]
    fn unknown_command_points_to_help() {
        let text = unknown_text("/foo");
        assert!(text.starts_with("❓ Unknown command: /foo"));
        assert!(text.contains("/help"));
    }
}
