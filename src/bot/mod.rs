/// Dispatcher setup and update handlers
pub mod runner;
/// Telegram implementations of the transport traits
pub mod telegram;

pub use runner::{run_bot, Command};
pub use telegram::{TelegramAdminNotifier, TelegramTransport};
