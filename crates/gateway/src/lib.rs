//! HTTP/WebSocket boundary: the Telegram webhook entry point, the
//! dashboard's management and chat APIs, image uploads, and realtime
//! new-message push over `/ws`.

pub mod access;
pub mod agents;
pub mod auth;
pub mod bots;
pub mod broadcast;
pub mod chat;
pub mod error;
pub mod server;
pub mod state;
pub mod uploads;
pub mod webhook;
pub mod ws;

pub use {
    auth::{AuthVerifier, CurrentAgent, StaticTokenVerifier},
    broadcast::WsEventSink,
    error::{ApiError, ApiResult},
    server::{build_router, serve},
    state::GatewayState,
};
