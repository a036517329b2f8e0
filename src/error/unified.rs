//! Error classification.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Broad error category used to pick a recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Backend,
    Network,
    Timeout,
    Tool,
    Persistence,
    Configuration,
    Serialization,
    Unknown,
}

impl ErrorCategory {
    /// Whether errors of this category end the current turn.
    ///
    /// Tool faults are surfaced to the model as data and never reach this
    /// point in the normal flow.
    pub fn terminates_turn(self) -> bool {
        !matches!(self, Self::Tool)
    }
}
