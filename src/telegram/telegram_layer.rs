// Telegram layer - Bot API client, update types and the polling loop.

pub mod bot_api;
pub mod update_models;
pub mod update_poller;

pub use bot_api::TelegramApiClient;
pub use update_poller::UpdatePoller;
