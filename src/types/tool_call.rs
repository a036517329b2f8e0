//! Tool-call records built while a stream is consumed.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::tools::route::ToolRoute;

/// A tool call still being assembled from fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
}

impl PendingToolCall {
    /// Whether the argument buffer (or `{}` when empty) parses as JSON.
    pub fn arguments_parse(&self) -> bool {
        let raw = if self.arguments.trim().is_empty() {
            "{}"
        } else {
            self.arguments.as_str()
        };
        serde_json::from_str::<serde_json::Value>(raw).is_ok()
    }
}

/// How a completed call's arguments were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArgumentSource {
    /// The buffer parsed as-is.
    Parsed,
    /// The buffer was truncated and structurally repaired.
    Repaired,
    /// The buffer did not parse and `{}` was substituted.
    Defaulted,
}

/// A tool call ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub source: ArgumentSource,
    pub route: ToolRoute,
}

impl CompletedToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            route: ToolRoute::resolve(&name),
            name,
            arguments,
            source: ArgumentSource::Parsed,
        }
    }

    pub fn with_source(mut self, source: ArgumentSource) -> Self {
        self.source = source;
        self
    }
}

/// Lifecycle of a tool call, used for recovery bookkeeping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolCallState {
    #[serde(rename = "BUILDING_PARAMS")]
    #[strum(to_string = "BUILDING_PARAMS")]
    BuildingArguments,
    #[serde(rename = "PARAMS_COMPLETE_NOT_EXECUTED")]
    #[strum(to_string = "PARAMS_COMPLETE_NOT_EXECUTED")]
    ArgumentsCompleteUnexecuted,
    Executing,
    #[serde(rename = "RESULT_RECEIVED_NOT_SAVED")]
    #[strum(to_string = "RESULT_RECEIVED_NOT_SAVED")]
    ResultUnsaved,
    #[serde(rename = "RESULT_SAVED_NOT_PROCESSED")]
    #[strum(to_string = "RESULT_SAVED_NOT_PROCESSED")]
    ResultSavedUnprocessed,
    ProcessingResult,
}

/// Snapshot of a pending call, as recorded in a recovery marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompleteCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
    pub is_complete: bool,
}

impl From<&PendingToolCall> for IncompleteCall {
    fn from(call: &PendingToolCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            is_complete: call.arguments_parse(),
        }
    }
}
