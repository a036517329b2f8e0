//! Reassembly of streamed tool-call fragments.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::repair::repair;
use crate::types::{
    ArgumentSource, ChatChunk, CompletedToolCall, FinishReason, IncompleteCall, PendingToolCall,
};

/// Result of forcing completion on an unterminated tool-call stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ForcedCompletion {
    /// Every pending call is named and its arguments parse or were repaired.
    Completed(Vec<CompletedToolCall>),
    /// At least one call could not be completed; the snapshot covers all of them.
    Unresolved(Vec<IncompleteCall>),
}

/// Merges positional tool-call fragments into whole calls.
///
/// Fragments are keyed by their `index`. Names are set by the last non-empty
/// name seen at an index, argument text is concatenated in arrival order, and
/// the first non-empty id wins.
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    calls: BTreeMap<u32, PendingToolCall>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in.
    ///
    /// Returns the completed calls, in index order, when the chunk carries
    /// the tool-calls finish signal. Emitting drains the accumulator.
    pub fn absorb(&mut self, chunk: &ChatChunk) -> Option<Vec<CompletedToolCall>> {
        let choice = chunk.first()?;

        if let Some(fragments) = &choice.delta.tool_calls {
            for fragment in fragments {
                let call = self.calls.entry(fragment.index).or_default();
                if let Some(id) = fragment.id.as_deref().filter(|id| !id.is_empty()) {
                    if call.id.is_none() {
                        call.id = Some(id.to_string());
                    }
                }
                if let Some(function) = &fragment.function {
                    if let Some(name) = function.name.as_deref().filter(|n| !n.is_empty()) {
                        call.name = name.to_string();
                    }
                    if let Some(arguments) = &function.arguments {
                        call.arguments.push_str(arguments);
                    }
                }
            }
        }

        if chunk.finish_reason() != Some(FinishReason::ToolCalls) {
            return None;
        }

        let calls = std::mem::take(&mut self.calls);
        Some(calls.into_values().map(finalize).collect())
    }

    /// Whether any call is still being assembled.
    pub fn has_pending(&self) -> bool {
        !self.calls.is_empty()
    }

    /// Snapshot of every pending call, in index order.
    pub fn incomplete_calls(&self) -> Vec<IncompleteCall> {
        self.calls.values().map(IncompleteCall::from).collect()
    }

    /// Complete pending calls after the stream ended without a finish signal.
    ///
    /// Completion only succeeds when every call can be completed; otherwise
    /// nothing is emitted and the accumulator keeps its state for the caller
    /// to snapshot.
    pub fn complete_with_repair(&mut self) -> ForcedCompletion {
        let mut completed = Vec::with_capacity(self.calls.len());
        for call in self.calls.values() {
            match force_arguments(call) {
                Some((arguments, source)) if !call.name.is_empty() => {
                    completed.push(
                        CompletedToolCall::new(call_id(call), call.name.clone(), arguments)
                            .with_source(source),
                    );
                }
                _ => return ForcedCompletion::Unresolved(self.incomplete_calls()),
            }
        }
        self.calls.clear();
        ForcedCompletion::Completed(completed)
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

fn call_id(call: &PendingToolCall) -> String {
    call.id
        .clone()
        .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()))
}

fn finalize(call: PendingToolCall) -> CompletedToolCall {
    let id = call_id(&call);
    if call.arguments.trim().is_empty() {
        return CompletedToolCall::new(id, call.name, serde_json::json!({}));
    }
    match serde_json::from_str(&call.arguments) {
        Ok(arguments) => CompletedToolCall::new(id, call.name, arguments),
        Err(error) => {
            tracing::warn!(
                tool = %call.name,
                call_id = %id,
                %error,
                "tool-call arguments did not parse, substituting empty object"
            );
            CompletedToolCall::new(id, call.name, serde_json::json!({}))
                .with_source(ArgumentSource::Defaulted)
        }
    }
}

fn force_arguments(call: &PendingToolCall) -> Option<(serde_json::Value, ArgumentSource)> {
    if call.arguments.trim().is_empty() {
        return Some((serde_json::json!({}), ArgumentSource::Parsed));
    }
    if let Ok(value) = serde_json::from_str(&call.arguments) {
        return Some((value, ArgumentSource::Parsed));
    }
    let fixed = repair(&call.arguments)?;
    let value = serde_json::from_str(&fixed).ok()?;
    tracing::info!(tool = %call.name, repaired = %fixed, "repaired truncated tool-call arguments");
    Some((value, ArgumentSource::Repaired))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCallFragment;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fragments(frags: Vec<ToolCallFragment>) -> ChatChunk {
        ChatChunk::tool_calls(frags, None)
    }

    fn finish() -> ChatChunk {
        ChatChunk::tool_calls(Vec::new(), Some(FinishReason::ToolCalls))
    }

    #[test]
    fn merges_fragments_and_emits_on_finish() {
        let mut acc = DeltaAccumulator::new();
        assert!(acc
            .absorb(&fragments(vec![ToolCallFragment::start(0, "c1", "search")]))
            .is_none());
        assert!(acc
            .absorb(&fragments(vec![ToolCallFragment::arguments(0, r#"{"q":"#)]))
            .is_none());
        assert!(acc
            .absorb(&fragments(vec![ToolCallFragment::arguments(0, r#""cat"}"#)]))
            .is_none());

        let calls = acc.absorb(&finish()).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "c1");
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[0].arguments, json!({"q": "cat"}));
        assert_eq!(calls[0].source, ArgumentSource::Parsed);
        assert!(!acc.has_pending());
    }

    #[test]
    fn emits_in_index_order_regardless_of_arrival() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&fragments(vec![
            ToolCallFragment::start(1, "b", "second"),
            ToolCallFragment::start(0, "a", "first"),
        ]));
        acc.absorb(&fragments(vec![
            ToolCallFragment::arguments(1, "{}"),
            ToolCallFragment::arguments(0, r#"{"x":1}"#),
        ]));
        let calls = acc.absorb(&finish()).unwrap();
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn empty_name_fragment_does_not_clear_name() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&fragments(vec![ToolCallFragment::start(0, "c1", "read")]));
        acc.absorb(&fragments(vec![ToolCallFragment::start(0, "", "")]));
        let calls = acc.absorb(&finish()).unwrap();
        assert_eq!(calls[0].name, "read");
        assert_eq!(calls[0].id, "c1");
    }

    #[test]
    fn unparseable_arguments_default_to_empty_object() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&fragments(vec![ToolCallFragment::start(0, "c1", "write")]));
        acc.absorb(&fragments(vec![ToolCallFragment::arguments(0, "{not json")]));
        let calls = acc.absorb(&finish()).unwrap();
        assert_eq!(calls[0].arguments, json!({}));
        assert_eq!(calls[0].source, ArgumentSource::Defaulted);
    }

    #[test]
    fn missing_id_is_generated() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&fragments(vec![ToolCallFragment::arguments(0, "{}")]));
        acc.absorb(&fragments(vec![ToolCallFragment {
            index: 0,
            id: None,
            function: Some(crate::types::FunctionFragment {
                name: Some("now".into()),
                arguments: None,
            }),
        }]));
        let calls = acc.absorb(&finish()).unwrap();
        assert!(calls[0].id.starts_with("call_"));
    }

    #[test]
    fn content_chunks_are_ignored() {
        let mut acc = DeltaAccumulator::new();
        assert!(acc.absorb(&ChatChunk::content("hello")).is_none());
        assert!(acc.absorb(&ChatChunk::stop("")).is_none());
        assert!(!acc.has_pending());
    }

    #[test]
    fn forced_completion_repairs_truncated_arguments() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&fragments(vec![ToolCallFragment::start(0, "w1", "write")]));
        acc.absorb(&fragments(vec![ToolCallFragment::arguments(
            0,
            r#"{"path":"a.txt","content":"hi"#,
        )]));
        match acc.complete_with_repair() {
            ForcedCompletion::Completed(calls) => {
                assert_eq!(calls[0].arguments, json!({"path": "a.txt", "content": "hi"}));
                assert_eq!(calls[0].source, ArgumentSource::Repaired);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(!acc.has_pending());
    }

    #[test]
    fn forced_completion_fails_as_a_whole() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&fragments(vec![
            ToolCallFragment::start(0, "ok", "list"),
            ToolCallFragment::start(1, "w1", "write"),
        ]));
        acc.absorb(&fragments(vec![ToolCallFragment::arguments(1, r#"{"path":"#)]));
        match acc.complete_with_repair() {
            ForcedCompletion::Unresolved(info) => {
                assert_eq!(info.len(), 2);
                assert!(info[0].is_complete);
                assert_eq!(info[1].name, "write");
                assert_eq!(info[1].arguments, r#"{"path":"#);
                assert!(!info[1].is_complete);
            }
            other => panic!("expected unresolved, got {other:?}"),
        }
        assert!(acc.has_pending());
        acc.clear();
        assert!(!acc.has_pending());
    }

    #[test]
    fn forced_completion_requires_a_name() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&fragments(vec![ToolCallFragment::arguments(0, "{}")]));
        assert!(matches!(
            acc.complete_with_repair(),
            ForcedCompletion::Unresolved(_)
        ));
    }
}
