//! Detection of turns left mid-tool-call.

use super::directive::{self, ToolCallDirective};
use super::recovery::RecoveryMarker;
use crate::types::{Message, MessageId, Role, ToolCallState};

/// A tool call a previous turn did not finish.
#[derive(Debug, Clone, PartialEq)]
pub enum UnresolvedTurn {
    /// A tool result was saved but the model never replied to it.
    ResultUnprocessed {
        message_id: MessageId,
        directive: ToolCallDirective,
    },
    /// The turn ended with a recovery marker.
    Marked {
        message_id: MessageId,
        marker: RecoveryMarker,
    },
}

impl UnresolvedTurn {
    pub fn state(&self) -> ToolCallState {
        match self {
            Self::ResultUnprocessed { .. } => ToolCallState::ResultSavedUnprocessed,
            Self::Marked { marker, .. } => marker.state,
        }
    }

    pub fn message_id(&self) -> MessageId {
        match self {
            Self::ResultUnprocessed { message_id, .. } | Self::Marked { message_id, .. } => {
                *message_id
            }
        }
    }
}

/// Inspect a session's messages (creation order) for an unresolved turn.
///
/// Only the latest assistant message is considered, and only when no user
/// message follows it.
pub fn detect_unresolved(messages: &[Message]) -> Option<UnresolvedTurn> {
    let (position, last_assistant) = messages
        .iter()
        .enumerate()
        .rev()
        .find(|(_, m)| m.role == Role::Assistant)?;

    let answered = messages[position + 1..]
        .iter()
        .any(|m| m.role == Role::User);
    if answered {
        return None;
    }

    if let Some((directive, tail)) = directive::last_with_tail(&last_assistant.content) {
        if tail.trim().is_empty() {
            return Some(UnresolvedTurn::ResultUnprocessed {
                message_id: last_assistant.id,
                directive,
            });
        }
    }

    RecoveryMarker::parse(&last_assistant.content).map(|marker| UnresolvedTurn::Marked {
        message_id: last_assistant.id,
        marker,
    })
}
