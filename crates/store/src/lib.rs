//! Conversation store: durable records for bots, agents, assignments,
//! telegram end users, and messages.
//!
//! The [`ConversationStore`] trait is the boundary the rest of the system
//! programs against; [`SqliteStore`] is the shipped implementation.

pub mod error;
pub mod sqlite;
pub mod store;
pub mod types;

pub use {
    error::{Result, StoreError},
    sqlite::SqliteStore,
    store::ConversationStore,
    types::{
        Agent, AgentPatch, Assignment, Bot, BotPatch, ChatStats, EndUser, LastMessage,
        MessagePage, MessageRecord, NewAgent, NewAssignment, NewBot, NewEndUser, NewMessage,
        UserOverview,
    },
};
