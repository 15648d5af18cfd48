//! Data access for the chat screen
//!
//! [`ChatBackend`] is the contract the chat service consumes: clients visible
//! to the operator, their conversations, messages and policies, and sending a
//! message with a streamed reply. [`SqliteBackend`] is the local
//! implementation.
//!
//! # Reply stream
//!
//! ```text
//! send_message ──▶ Accepted(user msg) ──▶ Delta* ──▶ Completed(ai msg)
//!                                            └────▶ Failed(reason)
//! ```
//!
//! The stream always ends with exactly one `Completed` or `Failed`.

mod seed;
mod sqlite;

pub use seed::{seed_demo, SeedSummary};
pub use sqlite::SqliteBackend;

use crate::model::{Client, Conversation, Message, Operator, Policy};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Progress of a reply to a sent message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent {
    /// The user message was stored; carries its persisted form
    Accepted(Message),
    /// Incremental reply text
    Delta(String),
    /// The AI message was stored with its final id and token usage
    Completed(Message),
    /// The reply could not be produced; the user message was not kept
    Failed(String),
}

impl ReplyEvent {
    /// Last event of a reply stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReplyEvent::Completed(_) | ReplyEvent::Failed(_))
    }
}

pub type ReplyStream = BoxStream<'static, ReplyEvent>;

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Clients the operator may chat about, by name
    async fn list_clients(&self, operator: &Operator) -> anyhow::Result<Vec<Client>>;

    /// Conversations of a client, most recently updated first
    async fn list_conversations(&self, client_id: &str) -> anyhow::Result<Vec<Conversation>>;

    /// Messages of a conversation, chronological
    async fn list_messages(&self, conversation_id: &str) -> anyhow::Result<Vec<Message>>;

    async fn create_conversation(
        &self,
        client_id: &str,
        title: Option<String>,
    ) -> anyhow::Result<Conversation>;

    /// Store the user message and stream the assistant's reply
    ///
    /// Errors returned here mean nothing was stored.
    async fn send_message(&self, conversation_id: &str, text: &str)
        -> anyhow::Result<ReplyStream>;

    async fn list_policies(&self, client_id: &str) -> anyhow::Result<Vec<Policy>>;
}
