pub mod commands;
pub mod replies;
pub mod sink;

pub use commands::{start_bot, BotDeps, Command};
pub use sink::TelegramSink;
