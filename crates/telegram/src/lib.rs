//! Telegram transport: the [`botdesk_registry::BotAdapter`] implementation
//! backed by teloxide, plus the factory that authenticates tokens and
//! registers webhooks.

pub mod adapter;
pub mod factory;

pub use {adapter::TelegramAdapter, factory::TelegramAdapterFactory};
