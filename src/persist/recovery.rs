//! Recovery markers for tool calls left unfinished by a stream.
//!
//! A marker is appended to the open assistant message. It reads as a short
//! summary for the user and ends with a machine-readable tail:
//!
//! ```text
//! [MCP_INCOMPLETE:BUILDING_PARAMS]
//! { "state": "BUILDING_PARAMS", "incompleteInfo": [ … ] }
//! ```

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{IncompleteCall, ToolCallState};

pub const DEFAULT_RECOVERY_PROMPT: &str = "Reply \"continue\" to finish this tool call.";

const ARGUMENT_PREVIEW_CHARS: usize = 100;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[MCP_INCOMPLETE:(\w+)\]\s*([\s\S]*)$").expect("marker regex must compile")
});

/// Machine-readable part of a recovery marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryMarker {
    pub state: ToolCallState,
    #[serde(rename = "incompleteInfo")]
    pub incomplete_info: Vec<IncompleteCall>,
}

impl RecoveryMarker {
    pub fn new(state: ToolCallState, incomplete_info: Vec<IncompleteCall>) -> Self {
        Self {
            state,
            incomplete_info,
        }
    }

    /// Full marker text: summary, `prompt`, tag and JSON blob.
    pub fn render(&self, prompt: &str) -> String {
        let mut text = String::from("\n\n[Incomplete tool call]\n");
        let _ = writeln!(text, "State: {}\n", self.state);
        for (position, call) in self.incomplete_info.iter().enumerate() {
            let _ = writeln!(text, "{}. Tool: {}", position + 1, call.name);
            let _ = writeln!(text, "   Arguments: {}", preview(&call.arguments));
            let _ = writeln!(
                text,
                "   JSON: {}\n",
                if call.is_complete { "complete" } else { "incomplete" }
            );
        }
        let _ = writeln!(text, "{prompt}");
        let _ = writeln!(text, "\n[MCP_INCOMPLETE:{}]", self.state);
        text.push_str(
            &serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string()),
        );
        text
    }

    /// Find a marker at the end of `text`.
    ///
    /// The JSON blob is authoritative; a tag without a parseable blob is
    /// ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = MARKER_RE.captures(text)?;
        let blob = caps.get(2)?.as_str().trim();
        match serde_json::from_str(blob) {
            Ok(marker) => Some(marker),
            Err(error) => {
                tracing::warn!(%error, "recovery tag found but its state blob did not parse");
                None
            }
        }
    }
}

/// Inline notice sent to the client when a marker is persisted.
pub fn notice(prompt: &str) -> String {
    format!("\n\n⚠️ A tool call was cut off before its arguments were complete. {prompt}")
}

fn preview(arguments: &str) -> String {
    let mut chars = arguments.chars();
    let head: String = chars.by_ref().take(ARGUMENT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn marker(arguments: &str) -> RecoveryMarker {
        RecoveryMarker::new(
            ToolCallState::BuildingArguments,
            vec![IncompleteCall {
                id: Some("w1".into()),
                name: "write".into(),
                arguments: arguments.into(),
                is_complete: false,
            }],
        )
    }

    #[test]
    fn render_then_parse_recovers_state() {
        let original = marker(r#"{"path":"#);
        let text = format!("Writing the file now.{}", original.render(DEFAULT_RECOVERY_PROMPT));

        assert!(text.contains("[MCP_INCOMPLETE:BUILDING_PARAMS]"));
        assert!(text.contains("\"incompleteInfo\""));
        assert!(text.contains("\"isComplete\": false"));
        assert_eq!(RecoveryMarker::parse(&text), Some(original));
    }

    #[test]
    fn long_arguments_are_truncated_in_summary() {
        let long = "x".repeat(150);
        let text = marker(&long).render("go on");
        let expected = format!("   Arguments: {}...\n", "x".repeat(100));
        assert!(text.contains(&expected));
        assert!(text.contains("go on\n"));
    }

    #[test]
    fn tag_without_blob_is_ignored() {
        assert_eq!(RecoveryMarker::parse("[MCP_INCOMPLETE:EXECUTING]\nnot json"), None);
        assert_eq!(RecoveryMarker::parse("plain reply"), None);
    }
}
