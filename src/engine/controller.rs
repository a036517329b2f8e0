//! Continuation Controller.
//!
//! Drives one chat turn: streams a model response to the client, executes the
//! tool calls it requests, and re-invokes the model with the results until a
//! response ends without tool calls. Continuations run as an explicit loop
//! bounded by [`LoopSettings::max_continuations`].

use std::sync::Arc;

use bon::Builder;
use futures::StreamExt;

use super::sink::ChunkSink;
use super::state::{ControllerState, TurnOutcome, TurnStatus};
use crate::backend::{ChatBackend, ChatRequest, ChunkStream};
use crate::config::LoopSettings;
use crate::error::{Result, TurnError};
use crate::history;
use crate::persist::{
    detect_unresolved, recovery, ConversationWriter, RecoveryMarker, ToolCallDirective,
    UnresolvedTurn,
};
use crate::store::MessageStore;
use crate::stream::{DeltaAccumulator, ForcedCompletion};
use crate::tools::ToolDispatcher;
use crate::types::{
    ChatChunk, ChatMessage, CompletedToolCall, FinishReason, GenerationParams, IncompleteCall,
    ModelRef, Role, Session, SessionId, ToolCallState,
};
use crate::util::timeout::with_optional_timeout;

const TITLE_PROMPT: &str = "Write a title for the conversation below.
Rules:
1. At most ten words.
2. Start with an emoji that fits the conversation.
3. Use the language of the conversation.
4. No punctuation, no quotes and no \"Title:\" prefix.
5. Reply with the title only.

Conversation:
";

/// Input for one turn.
#[derive(Debug, Clone, Builder)]
pub struct TurnRequest {
    pub session_id: SessionId,
    #[builder(into)]
    pub user_message: String,
    /// History before this turn's user message; loaded from the store when
    /// absent.
    pub history: Option<Vec<ChatMessage>>,
    /// Overrides the session's model.
    pub model: Option<ModelRef>,
    /// Overrides the session's generation parameters field by field.
    #[builder(default)]
    pub params: GenerationParams,
    #[builder(default = true)]
    pub use_tools: bool,
    /// Retrieved reference material for the model.
    #[builder(into)]
    pub context: Option<String>,
}

enum RoundEnd {
    Finished,
    ToolCalls(Vec<CompletedToolCall>),
    Unresolved(Vec<IncompleteCall>),
    Cancelled,
    Failed(TurnError),
}

/// What one model stream produced.
struct Round {
    text: String,
    end: RoundEnd,
}

/// Per-turn bookkeeping shared by the loop's steps.
struct Turn<'a> {
    session_id: SessionId,
    sink: &'a ChunkSink,
    state: ControllerState,
    stop_sent: bool,
}

impl<'a> Turn<'a> {
    fn new(session_id: SessionId, sink: &'a ChunkSink) -> Self {
        Self {
            session_id,
            sink,
            state: ControllerState::Streaming,
            stop_sent: false,
        }
    }

    fn enter(&mut self, next: ControllerState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(session_id = %self.session_id, from = %self.state, to = %next, "unexpected controller transition");
        }
        tracing::debug!(session_id = %self.session_id, from = %self.state, to = %next, "controller state");
        self.state = next;
    }

    /// Send a chunk unless the client is gone.
    fn emit(&mut self, chunk: &ChatChunk) -> bool {
        if self.sink.is_closed() {
            return false;
        }
        if chunk.finish_reason() == Some(FinishReason::Stop) {
            self.stop_sent = true;
        }
        self.sink.send(chunk)
    }
}

/// Runs chat turns against a backend, a tool dispatcher and a message store.
pub struct ContinuationController {
    backend: Arc<dyn ChatBackend>,
    dispatcher: ToolDispatcher,
    writer: ConversationWriter,
    settings: LoopSettings,
}

impl ContinuationController {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        dispatcher: ToolDispatcher,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            backend,
            dispatcher,
            writer: ConversationWriter::new(store),
            settings: LoopSettings::default(),
        }
    }

    /// Apply loop settings; the tool timeout is passed on to the dispatcher.
    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.dispatcher = self.dispatcher.with_timeout(settings.tool_timeout);
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        self.writer.store()
    }

    /// An unresolved tool call left by the session's previous turn, if any.
    pub async fn pending_recovery(&self, session_id: SessionId) -> Result<Option<UnresolvedTurn>> {
        let messages = self.store().list_messages(session_id).await?;
        Ok(detect_unresolved(&messages))
    }

    /// Ask the session's model for a short title and store it.
    ///
    /// Reasoning blocks are dropped from the reply. An empty reply, or a
    /// session with nothing to summarize, leaves the title unchanged.
    pub async fn summarize_title(&self, session_id: SessionId) -> Result<Session> {
        let session = self.store().get_session(session_id).await?;
        let transcript: String = self
            .store()
            .list_messages(session_id)
            .await?
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| (m.role, history::strip_reasoning(&m.content)))
            .filter(|(_, content)| !content.is_empty())
            .map(|(role, content)| format!("{role}: {content}\n"))
            .collect();
        if transcript.is_empty() {
            return Ok(session);
        }

        let request = ChatRequest {
            model: session.model.clone(),
            messages: vec![ChatMessage::user(format!("{TITLE_PROMPT}{transcript}"))],
            system_prompt: None,
            params: session.settings.params.clone(),
            tools: None,
            context: None,
        };
        let mut stream = self.backend.stream_chat(&request).await?;
        let idle = self.settings.stream_idle_timeout;
        let mut reply = String::new();
        while let Some(chunk) =
            with_optional_timeout(idle, async { Ok::<_, TurnError>(stream.next().await) }).await?
        {
            let chunk = chunk?;
            if let Some(content) = chunk.content_text() {
                reply.push_str(content);
            }
        }

        let title = history::strip_reasoning(&reply);
        if title.is_empty() {
            tracing::warn!(%session_id, "model returned an empty title");
            return Ok(session);
        }
        let updated = self.store().set_title(session_id, &title).await?;
        tracing::info!(%session_id, title = %updated.title, "session titled");
        Ok(updated)
    }

    /// Run one turn, streaming chunks into `sink`.
    ///
    /// Backend failures are written into the transcript and reported through
    /// [`TurnStatus::Failed`]; only persistence failures are returned as `Err`.
    pub async fn run_turn(&self, request: TurnRequest, sink: ChunkSink) -> Result<TurnOutcome> {
        let session_id = request.session_id;
        let session = self.store().get_session(session_id).await?;

        if let Some(unresolved) = self.pending_recovery(session_id).await? {
            tracing::info!(
                %session_id,
                state = %unresolved.state(),
                message_id = %unresolved.message_id(),
                "previous turn left an unresolved tool call"
            );
        }

        let mut messages = match request.history {
            Some(history) => history,
            None => history::from_messages(&self.store().list_messages(session_id).await?),
        };
        self.writer
            .record_message(session_id, Role::User, &request.user_message)
            .await?;
        messages.push(ChatMessage::user(request.user_message));

        let model = request.model.unwrap_or_else(|| session.model.clone());
        let open = self
            .writer
            .open_placeholder(session_id, Role::Assistant, Some(model.id.clone()))
            .await?;

        let tools = if request.use_tools {
            Some(self.dispatcher.available_tools().await)
        } else {
            None
        };
        let mut chat = ChatRequest {
            model,
            messages,
            system_prompt: session.settings.main_system_prompt(),
            params: request.params.over(&session.settings.params),
            tools,
            context: request.context,
        };

        let mut turn = Turn::new(session_id, &sink);
        let mut outcome = TurnOutcome {
            session_id,
            message_id: open.id,
            status: TurnStatus::Completed,
            continuations: 0,
            tool_calls_executed: 0,
            checkpoint: None,
        };

        loop {
            tracing::debug!(
                %session_id,
                model = %chat.model,
                continuation = outcome.continuations,
                messages = chat.messages.len(),
                "requesting model stream"
            );
            let stream = match self.backend.stream_chat(&chat).await {
                Ok(stream) => stream,
                Err(error) => {
                    outcome.status = self.report_failure(&mut turn, error).await?;
                    break;
                }
            };

            turn.stop_sent = false;
            let round = self.consume(stream, &mut turn).await;

            match round.end {
                RoundEnd::Finished => {
                    self.flush(session_id, &round.text).await?;
                    if !turn.stop_sent {
                        turn.emit(&ChatChunk::stop(""));
                    }
                    turn.enter(ControllerState::Sealed);
                    outcome.status = TurnStatus::Completed;
                    break;
                }
                RoundEnd::Cancelled => {
                    tracing::info!(%session_id, "client went away, sealing turn");
                    self.flush(session_id, &round.text).await?;
                    turn.enter(ControllerState::Sealed);
                    outcome.status = TurnStatus::Cancelled;
                    break;
                }
                RoundEnd::Failed(error) => {
                    self.flush(session_id, &round.text).await?;
                    outcome.status = self.report_failure(&mut turn, error).await?;
                    break;
                }
                RoundEnd::Unresolved(info) => {
                    self.flush(session_id, &round.text).await?;
                    let marker = RecoveryMarker::new(ToolCallState::BuildingArguments, info);
                    let prompt = &self.settings.recovery_prompt;
                    self.writer
                        .persist_recovery_marker(session_id, &marker, prompt)
                        .await?;
                    turn.emit(&ChatChunk::stop(recovery::notice(prompt)));
                    turn.enter(ControllerState::Sealed);
                    outcome.status = TurnStatus::Recovery(marker.state);
                    break;
                }
                RoundEnd::ToolCalls(calls) => {
                    turn.enter(ControllerState::ExecutingTools);
                    self.flush(session_id, &round.text).await?;

                    let batch = self
                        .dispatcher
                        .run_batch(&calls, session_id, || sink.is_closed())
                        .await;
                    outcome.tool_calls_executed += batch.results.len();

                    let mut directives = String::new();
                    for result in &batch.results {
                        let block = ToolCallDirective::from(result).render();
                        turn.emit(&ChatChunk::content(block.as_str()));
                        directives.push_str(&block);
                    }
                    let sealed = self
                        .writer
                        .seal_and_reopen(session_id, Role::Assistant, &directives)
                        .await?;
                    outcome.checkpoint = Some(sealed.id);

                    if batch.interrupted || sink.is_closed() {
                        turn.enter(ControllerState::Sealed);
                        outcome.status = TurnStatus::Cancelled;
                        break;
                    }

                    if outcome.continuations >= self.settings.max_continuations {
                        tracing::warn!(
                            %session_id,
                            limit = self.settings.max_continuations,
                            "continuation limit reached"
                        );
                        let note = format!(
                            "\n\nStopped after {} tool rounds without a final answer.",
                            outcome.continuations + 1
                        );
                        self.flush(session_id, &note).await?;
                        turn.emit(&ChatChunk::stop(note));
                        turn.enter(ControllerState::Sealed);
                        outcome.status = TurnStatus::ContinuationLimit;
                        break;
                    }

                    turn.enter(ControllerState::Continuing);
                    outcome.continuations += 1;
                    extend_history(&mut chat.messages, round.text + &directives);
                    turn.enter(ControllerState::Streaming);
                }
            }
        }

        tracing::info!(
            %session_id,
            message_id = %outcome.message_id,
            status = ?outcome.status,
            continuations = outcome.continuations,
            tool_calls = outcome.tool_calls_executed,
            "turn finished"
        );
        Ok(outcome)
    }

    /// Consume one model stream until it ends, requests tools, fails or the
    /// client goes away.
    async fn consume(&self, mut stream: ChunkStream, turn: &mut Turn<'_>) -> Round {
        let sink = turn.sink;
        let idle = self.settings.stream_idle_timeout;
        let mut accumulator = DeltaAccumulator::new();
        let mut text = String::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = sink.closed() => return Round { text, end: RoundEnd::Cancelled },
                next = with_optional_timeout(idle, async { Ok::<_, TurnError>(stream.next().await) }) => next,
            };
            let mut chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(error))) => return Round { text, end: RoundEnd::Failed(error) },
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(session_id = %turn.session_id, %error, "model stream went idle");
                    return Round { text, end: RoundEnd::Failed(error) };
                }
            };

            if sink.is_closed() {
                return Round { text, end: RoundEnd::Cancelled };
            }

            chunk.normalize_reasoning();
            let ready = accumulator.absorb(&chunk);

            // Tool-call fragments stay server side, and so does any finish
            // signal while calls are still being assembled.
            let pending = accumulator.has_pending();
            for choice in &mut chunk.choices {
                choice.delta.tool_calls = None;
                let finish = choice.finish_reason.as_deref().map(FinishReason::parse);
                if pending || finish == Some(FinishReason::ToolCalls) {
                    choice.finish_reason = None;
                }
            }
            if let Some(content) = chunk.content_text() {
                text.push_str(content);
            }
            if chunk.content_text().is_some()
                || chunk.reasoning_text().is_some()
                || chunk.finish_reason().is_some()
            {
                turn.emit(&chunk);
            }

            if let Some(calls) = ready {
                if calls.is_empty() {
                    tracing::warn!(session_id = %turn.session_id, "tool-calls finish signal without any tool calls");
                } else {
                    turn.enter(ControllerState::ToolCallReady);
                    return Round { text, end: RoundEnd::ToolCalls(calls) };
                }
            }
        }

        if !accumulator.has_pending() {
            return Round { text, end: RoundEnd::Finished };
        }

        turn.enter(ControllerState::Repairing);
        match accumulator.complete_with_repair() {
            ForcedCompletion::Completed(calls) => {
                tracing::info!(
                    session_id = %turn.session_id,
                    calls = calls.len(),
                    "stream ended mid tool call, completed by repair"
                );
                turn.enter(ControllerState::ToolCallReady);
                Round { text, end: RoundEnd::ToolCalls(calls) }
            }
            ForcedCompletion::Unresolved(info) => {
                tracing::warn!(
                    session_id = %turn.session_id,
                    calls = info.len(),
                    "stream ended mid tool call and arguments could not be repaired"
                );
                Round { text, end: RoundEnd::Unresolved(info) }
            }
        }
    }

    async fn flush(&self, session_id: SessionId, text: &str) -> Result<()> {
        if !text.is_empty() {
            self.writer
                .append_to_open(session_id, Role::Assistant, text)
                .await?;
        }
        Ok(())
    }

    /// Write a backend failure into the transcript and to the client.
    async fn report_failure(&self, turn: &mut Turn<'_>, error: TurnError) -> Result<TurnStatus> {
        tracing::warn!(
            session_id = %turn.session_id,
            %error,
            transient = error.is_transient(),
            "model request failed"
        );
        let note = format!("\n\n[Error] {error}");
        self.flush(turn.session_id, &note).await?;
        turn.emit(&ChatChunk::stop(note));
        turn.enter(ControllerState::Sealed);
        Ok(TurnStatus::Failed(error.to_string()))
    }
}

/// Add a completed tool round to the request history: the round's text and
/// directives, then an empty placeholder for the reopened message. A trailing
/// placeholder from the previous round is replaced.
fn extend_history(messages: &mut Vec<ChatMessage>, round_content: String) {
    if messages.last().is_some_and(ChatMessage::is_placeholder) {
        messages.pop();
    }
    messages.push(ChatMessage::assistant(round_content));
    messages.push(ChatMessage::assistant(""));
}

impl std::fmt::Debug for ContinuationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContinuationController")
            .field("backend", &self.backend.name())
            .field("dispatcher", &self.dispatcher)
            .field("settings", &self.settings)
            .finish()
    }
}
