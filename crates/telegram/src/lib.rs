//! Telegram operator surface: chat commands in, alerts out.

pub mod commands;
pub mod notifier;
pub mod parse;

pub use commands::{start_bot, BotDeps, Command};
pub use notifier::TelegramNotifier;
