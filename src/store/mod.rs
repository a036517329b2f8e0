//! Session and message storage.
//!
//! [`MessageStore`] is the storage collaborator the engine writes through; the
//! bundled [`MemoryStore`] keeps everything in process.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Message, MessageId, ModelRef, NewMessage, Role, Session, SessionId, SessionSettings};

/// Storage operations over sessions and their messages.
///
/// Message ids must increase with creation order within a store.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_session(
        &self,
        title: &str,
        model: ModelRef,
        settings: SessionSettings,
    ) -> Result<Session>;

    async fn get_session(&self, id: SessionId) -> Result<Session>;

    /// Replace the session settings. A settings title also renames the session.
    async fn update_settings(&self, id: SessionId, settings: SessionSettings) -> Result<Session>;

    async fn set_title(&self, id: SessionId, title: &str) -> Result<Session>;

    /// Record the last sealed message of a completed tool round.
    async fn set_checkpoint(&self, id: SessionId, message_id: MessageId) -> Result<()>;

    /// Delete a session and all of its messages.
    async fn delete_session(&self, id: SessionId) -> Result<()>;

    async fn create_message(&self, message: NewMessage) -> Result<Message>;

    /// Concatenate `text` onto a message's content.
    async fn append_content(&self, id: MessageId, text: &str) -> Result<Message>;

    async fn update_content(&self, id: MessageId, content: String) -> Result<Message>;

    async fn set_round_end(&self, id: MessageId, is_round_end: bool) -> Result<Message>;

    /// The most recently created message of `role` in the session.
    async fn find_latest_by_role(&self, session_id: SessionId, role: Role)
        -> Result<Option<Message>>;

    /// All messages of the session in creation order.
    async fn list_messages(&self, session_id: SessionId) -> Result<Vec<Message>>;
}
