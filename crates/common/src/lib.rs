//! Shared types and small utilities used across all botdesk crates.

pub mod types;

pub use types::{AgentRole, MessageSender, ParseEnumError};

/// Current wall-clock time as unix milliseconds (UTC).
///
/// All persisted timestamps use this representation; localization is a
/// presentation concern and happens in the consumer.
#[must_use]
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Generate a fresh opaque entity id (UUID v4, string form).
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
