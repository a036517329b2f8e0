//! Shaping stored history into the message list a model sees.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ChatMessage, Message, Role};

static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<think>.*?</think>|<redacted_reasoning>.*?</redacted_reasoning>")
        .expect("reasoning block regex must compile")
});

/// Convert stored messages to history entries.
pub fn from_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages.iter().map(ChatMessage::from).collect()
}

/// Prepare history for a model request.
///
/// - only messages after the most recent round-end marker are kept
/// - reasoning blocks are stripped and content trimmed
/// - empty messages are dropped
/// - consecutive messages of one role are merged with `\n`
/// - `system_prompt` is prepended unless the history opens with a system message
pub fn prepare_for_model(messages: &[ChatMessage], system_prompt: Option<&str>) -> Vec<ChatMessage> {
    let start = messages
        .iter()
        .rposition(|m| m.is_round_end)
        .map_or(0, |index| index + 1);

    let mut shaped: Vec<ChatMessage> = Vec::with_capacity(messages.len() - start + 1);
    for message in &messages[start..] {
        let content = strip_reasoning(&message.content);
        if content.is_empty() {
            continue;
        }
        match shaped.last_mut() {
            Some(previous) if previous.role == message.role => {
                previous.content.push('\n');
                previous.content.push_str(&content);
            }
            _ => shaped.push(ChatMessage {
                role: message.role,
                content,
                is_round_end: false,
            }),
        }
    }

    if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
        if shaped.first().map(|m| m.role) != Some(Role::System) {
            shaped.insert(0, ChatMessage::system(prompt));
        }
    }
    shaped
}

/// Remove `<think>` and `<redacted_reasoning>` blocks, then trim.
pub fn strip_reasoning(content: &str) -> String {
    REASONING_RE.replace_all(content, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_end(mut message: ChatMessage) -> ChatMessage {
        message.is_round_end = true;
        message
    }

    #[test]
    fn replays_only_after_latest_round_end() {
        let history = vec![
            ChatMessage::user("old question"),
            round_end(ChatMessage::assistant("old answer")),
            ChatMessage::user("new question"),
        ];
        assert_eq!(
            prepare_for_model(&history, None),
            vec![ChatMessage::user("new question")]
        );
    }

    #[test]
    fn merges_same_role_and_drops_placeholders() {
        let history = vec![
            ChatMessage::user("look this up"),
            ChatMessage::assistant("Searching.\n:::tool_call{.tool_call}\n{}\n:::"),
            ChatMessage::assistant(""),
            ChatMessage::assistant("Found it."),
        ];
        let shaped = prepare_for_model(&history, Some("be brief"));
        assert_eq!(shaped.len(), 3);
        assert_eq!(shaped[0], ChatMessage::system("be brief"));
        assert_eq!(
            shaped[2].content,
            "Searching.\n:::tool_call{.tool_call}\n{}\n:::\nFound it."
        );
    }

    #[test]
    fn strips_reasoning_blocks() {
        assert_eq!(
            strip_reasoning("<think>\nhmm\n</think>\nAnswer <redacted_reasoning>x</redacted_reasoning>!"),
            "Answer !"
        );
        let history = vec![ChatMessage::assistant("<think>only thoughts</think>")];
        assert!(prepare_for_model(&history, None).is_empty());
    }

    #[test]
    fn existing_system_message_is_kept() {
        let history = vec![ChatMessage::system("custom"), ChatMessage::user("hi")];
        let shaped = prepare_for_model(&history, Some("default"));
        assert_eq!(shaped[0].content, "custom");
        assert_eq!(shaped.len(), 2);
    }
}
