//! Streaming chunk wire format.
//!
//! Both directions use chat-completion delta framing: the model backend yields
//! [`ChatChunk`]s, and the engine writes them to its client as
//! newline-delimited JSON.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One unit of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A single choice inside a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: u32,
}

/// Incremental payload of a choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Alternate spelling used by some backends; folded into
    /// `reasoning_content` by [`ChatChunk::normalize_reasoning`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallFragment>>,
}

/// A positional fragment of a tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionFragment>,
}

/// Name and argument text carried by a fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Normalised terminal signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

impl FinishReason {
    /// Map a backend spelling onto a finish reason.
    ///
    /// `tool_calls` and `tool_use` both mean "tool calls requested".
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" => Self::Stop,
            "length" | "max_tokens" => Self::Length,
            "tool_calls" | "tool_use" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other,
        }
    }
}

impl ChatChunk {
    /// A content delta.
    pub fn content(text: impl Into<String>) -> Self {
        Self::single(
            ChunkDelta {
                content: Some(text.into()),
                ..Default::default()
            },
            None,
        )
    }

    /// A terminal content delta (`finish_reason: "stop"`).
    pub fn stop(text: impl Into<String>) -> Self {
        Self::single(
            ChunkDelta {
                content: Some(text.into()),
                ..Default::default()
            },
            Some(FinishReason::Stop),
        )
    }

    /// A chunk carrying tool-call fragments, optionally terminal.
    pub fn tool_calls(fragments: Vec<ToolCallFragment>, finish: Option<FinishReason>) -> Self {
        Self::single(
            ChunkDelta {
                tool_calls: Some(fragments),
                ..Default::default()
            },
            finish,
        )
    }

    fn single(delta: ChunkDelta, finish: Option<FinishReason>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta,
                finish_reason: finish.map(|f| f.to_string()),
                index: 0,
            }],
        }
    }

    /// The first choice, which is the only one the engine reads.
    pub fn first(&self) -> Option<&ChunkChoice> {
        self.choices.first()
    }

    /// Content text of the first choice, if non-empty.
    pub fn content_text(&self) -> Option<&str> {
        self.first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// Reasoning text of the first choice, if non-empty.
    pub fn reasoning_text(&self) -> Option<&str> {
        self.first()
            .and_then(|c| c.delta.reasoning_content.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// Normalised finish reason of the first choice.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.first()
            .and_then(|c| c.finish_reason.as_deref())
            .map(FinishReason::parse)
    }

    /// Fold `delta.reasoning` into `delta.reasoning_content`.
    pub fn normalize_reasoning(&mut self) {
        for choice in &mut self.choices {
            if let Some(reasoning) = choice.delta.reasoning.take() {
                if choice.delta.reasoning_content.is_none() {
                    choice.delta.reasoning_content = Some(reasoning);
                }
            }
        }
    }

    /// Encode as one NDJSON line (with trailing newline).
    pub fn to_line(&self) -> String {
        // Serialising plain strings and numbers cannot fail.
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

impl ToolCallFragment {
    /// Fragment carrying a call id and name.
    pub fn start(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            function: Some(FunctionFragment {
                name: Some(name.into()),
                arguments: None,
            }),
        }
    }

    /// Fragment carrying argument text only.
    pub fn arguments(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            function: Some(FunctionFragment {
                name: None,
                arguments: Some(text.into()),
            }),
        }
    }
}
