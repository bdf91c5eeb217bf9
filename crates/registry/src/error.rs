use std::error::Error as StdError;

use botdesk_store::StoreError;

/// Crate-wide result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Failure surface of the registry and message handler.
///
/// Faults scoped to a single bot's webhook or a single agent's notification
/// are recovered locally (logged, turned into a result value); only
/// agent-initiated operations propagate these to the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Operation targeted a bot with no live adapter.
    #[error("bot not running: {bot_id}")]
    NotRunning { bot_id: String },

    /// A referenced end user, message, bot, or assignment does not exist.
    #[error("{what} not found")]
    NotFound { what: &'static str },

    /// The transport rejected an agent-initiated send. Nothing was persisted.
    #[error("send failed: {source}")]
    SendFailed {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// An external transport call (download, notification send) failed.
    #[error("transport failure: {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistryError {
    #[must_use]
    pub fn not_running(bot_id: impl Into<String>) -> Self {
        Self::NotRunning {
            bot_id: bot_id.into(),
        }
    }

    #[must_use]
    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound { what }
    }

    #[must_use]
    pub fn send_failed(source: anyhow::Error) -> Self {
        Self::SendFailed {
            source: source.into(),
        }
    }

    #[must_use]
    pub fn transport(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source: source.into(),
        }
    }
}
