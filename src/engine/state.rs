//! Controller states and turn outcomes.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::types::{MessageId, SessionId, ToolCallState};

/// Where the continuation loop is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControllerState {
    Streaming,
    ToolCallReady,
    Repairing,
    ExecutingTools,
    Continuing,
    Sealed,
}

impl ControllerState {
    pub fn can_transition_to(self, next: ControllerState) -> bool {
        use ControllerState::*;
        matches!(
            (self, next),
            (Streaming, ToolCallReady)
                | (Streaming, Repairing)
                | (Streaming, Sealed)
                | (Repairing, ToolCallReady)
                | (Repairing, Sealed)
                | (ToolCallReady, ExecutingTools)
                | (ExecutingTools, Continuing)
                | (ExecutingTools, Sealed)
                | (Continuing, Streaming)
                | (Continuing, Sealed)
        )
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model finished without pending tool calls.
    Completed,
    /// The client went away; accumulated text was persisted.
    Cancelled,
    /// Pending tool calls could not be completed; a recovery marker was written.
    Recovery(ToolCallState),
    /// A backend failure ended the turn; the error was written to the transcript.
    Failed(String),
    /// The model kept requesting tools past the continuation bound.
    ContinuationLimit,
}

/// Summary of one [`run_turn`](super::ContinuationController::run_turn) call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    /// The assistant message the turn wrote into.
    pub message_id: MessageId,
    pub status: TurnStatus,
    /// Model requests issued after the first.
    pub continuations: u32,
    pub tool_calls_executed: usize,
    /// Last message sealed by a completed tool round.
    pub checkpoint: Option<MessageId>,
}
