//! Tool-call directive blocks.
//!
//! A directive is a fenced block embedded in assistant text:
//!
//! ```text
//! :::tool_call{.tool_call}
//! {"id":"…","name":"…","arguments":{…},"result":…}
//! :::
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tools::ToolResult;

pub const DIRECTIVE_OPEN: &str = ":::tool_call{.tool_call}";
pub const DIRECTIVE_CLOSE: &str = ":::";

/// Payload of one directive block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDirective {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: serde_json::Value,
}

impl From<&ToolResult> for ToolCallDirective {
    fn from(result: &ToolResult) -> Self {
        Self {
            id: result.call_id.clone(),
            name: result.name.clone(),
            arguments: result.arguments.clone(),
            result: result.result.clone(),
        }
    }
}

impl ToolCallDirective {
    /// Render as a block, padded with newlines so it stands on its own lines
    /// wherever it is appended.
    pub fn render(&self) -> String {
        let body = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("\n{DIRECTIVE_OPEN}\n{body}\n{DIRECTIVE_CLOSE}\n")
    }
}

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":::tool_call\{\.tool_call\}\s*([\s\S]*?)\s*\n:::")
        .expect("directive regex must compile")
});

/// Whether `text` contains a directive opener.
pub fn contains_directive(text: &str) -> bool {
    text.contains(":::tool_call")
}

/// Every well-formed directive in `text`, in order. Blocks whose payload does
/// not parse are skipped.
pub fn extract_all(text: &str) -> Vec<ToolCallDirective> {
    DIRECTIVE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|body| match serde_json::from_str(body.as_str()) {
            Ok(directive) => Some(directive),
            Err(error) => {
                tracing::debug!(%error, "skipping unparseable tool-call directive");
                None
            }
        })
        .collect()
}

/// The first well-formed directive in `text`.
pub fn extract_first(text: &str) -> Option<ToolCallDirective> {
    extract_all(text).into_iter().next()
}

/// The last well-formed directive in `text` and the text after it.
pub fn last_with_tail(text: &str) -> Option<(ToolCallDirective, &str)> {
    DIRECTIVE_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let block = caps.get(0)?;
            let directive = serde_json::from_str(caps.get(1)?.as_str()).ok()?;
            Some((directive, &text[block.end()..]))
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> ToolCallDirective {
        ToolCallDirective {
            id: "c1".into(),
            name: "search".into(),
            arguments: json!({"q": "cat"}),
            result: json!({"hits": ["a", "b"]}),
        }
    }

    #[test]
    fn rendered_block_is_fenced() {
        let text = sample().render();
        assert!(text.starts_with("\n:::tool_call{.tool_call}\n{"));
        assert!(text.ends_with("}\n:::\n"));
    }

    #[test]
    fn extracts_blocks_from_surrounding_text() {
        let mut second = sample();
        second.id = "c2".into();
        second.result = json!("contains ::: inside");
        let text = format!("Let me look.{}{}Done.", sample().render(), second.render());

        let found = extract_all(&text);
        assert_eq!(found, vec![sample(), second]);
        assert!(contains_directive(&text));
        assert_eq!(extract_first("no blocks here"), None);

        let (last, tail) = last_with_tail(&text).unwrap();
        assert_eq!(last.id, "c2");
        assert_eq!(tail, "\nDone.");
    }

    #[test]
    fn malformed_payload_is_skipped() {
        let text = format!(
            "{DIRECTIVE_OPEN}\n{{broken\n{DIRECTIVE_CLOSE}\n{}",
            sample().render()
        );
        assert_eq!(extract_all(&text), vec![sample()]);
    }
}
