//! Multi-bot runtime registry and message-routing core.
//!
//! [`BotRegistry`] owns the live mapping of bot id → connected adapter,
//! routes inbound webhook payloads to the right adapter, and fans out agent
//! notifications. [`MessageHandler`] translates decoded updates into
//! persisted messages and realtime events. The Telegram transport plugs in
//! through the [`BotAdapter`] / [`AdapterFactory`] traits.

pub mod adapter;
pub mod error;
pub mod events;
pub mod handler;
pub mod registry;

pub use {
    adapter::{AdapterFactory, BotAdapter, InboundUpdate, PhotoSource, SenderIdentity},
    error::{RegistryError, Result},
    events::{EndUserSummary, EventSink, NewMessageEvent},
    handler::{InboundOutcome, MessageHandler, PHOTO_PLACEHOLDER, WELCOME_TEXT},
    registry::{BotRegistry, RouteOutcome},
};
