//! Conversation Persistence Adapter.
//!
//! All writes to message content during a turn go through
//! [`ConversationWriter`], which keeps at most one open message per role: the
//! most recently created one.

use std::sync::Arc;

use super::recovery::RecoveryMarker;
use crate::error::Result;
use crate::store::MessageStore;
use crate::types::{Message, NewMessage, Role, SessionId};

/// Append-or-create writer over a [`MessageStore`].
#[derive(Clone)]
pub struct ConversationWriter {
    store: Arc<dyn MessageStore>,
}

impl ConversationWriter {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Create an empty message that becomes the open one for `role`.
    pub async fn open_placeholder(
        &self,
        session_id: SessionId,
        role: Role,
        model: Option<String>,
    ) -> Result<Message> {
        let created = self
            .store
            .create_message(NewMessage::new(session_id, role, "").with_model(model))
            .await
            .inspect_err(|error| {
                tracing::error!(%session_id, %role, %error, "failed to open placeholder message");
            })?;
        tracing::debug!(%session_id, message_id = %created.id, %role, "opened placeholder");
        Ok(created)
    }

    /// Store a complete message, such as the user's prompt for a turn.
    pub async fn record_message(
        &self,
        session_id: SessionId,
        role: Role,
        content: &str,
    ) -> Result<Message> {
        self.store
            .create_message(NewMessage::new(session_id, role, content))
            .await
            .inspect_err(|error| {
                tracing::error!(%session_id, %role, %error, "failed to record message");
            })
    }

    /// Concatenate `text` onto the open message of `role`, creating one if the
    /// session has none yet.
    pub async fn append_to_open(
        &self,
        session_id: SessionId,
        role: Role,
        text: &str,
    ) -> Result<Message> {
        let result = async {
            match self.store.find_latest_by_role(session_id, role).await? {
                Some(open) if text.is_empty() => Ok(open),
                Some(open) => self.store.append_content(open.id, text).await,
                None => {
                    self.store
                        .create_message(NewMessage::new(session_id, role, text))
                        .await
                }
            }
        }
        .await;
        result.inspect_err(|error| {
            tracing::error!(%session_id, %role, %error, "failed to append to open message");
        })
    }

    /// Flush a completed tool round into the open message and checkpoint it.
    ///
    /// `text` carries the round's buffered output followed by its tool-result
    /// directives. The same message stays open for the continuation, so the
    /// whole turn reads as one assistant message.
    pub async fn seal_and_reopen(
        &self,
        session_id: SessionId,
        role: Role,
        text: &str,
    ) -> Result<Message> {
        let sealed = self.append_to_open(session_id, role, text).await?;
        self.store
            .set_checkpoint(session_id, sealed.id)
            .await
            .inspect_err(|error| {
                tracing::error!(%session_id, message_id = %sealed.id, %error, "failed to record checkpoint");
            })?;
        tracing::debug!(%session_id, message_id = %sealed.id, "sealed tool round");
        Ok(sealed)
    }

    /// Append a recovery marker to the open assistant message.
    pub async fn persist_recovery_marker(
        &self,
        session_id: SessionId,
        marker: &RecoveryMarker,
        prompt: &str,
    ) -> Result<Message> {
        let written = self
            .append_to_open(session_id, Role::Assistant, &marker.render(prompt))
            .await?;
        tracing::warn!(
            %session_id,
            message_id = %written.id,
            state = %marker.state,
            pending = marker.incomplete_info.len(),
            "persisted recovery marker"
        );
        Ok(written)
    }
}

impl std::fmt::Debug for ConversationWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationWriter").finish_non_exhaustive()
    }
}
