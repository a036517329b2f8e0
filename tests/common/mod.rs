//! Shared test helpers: scripted backends, recording tools and a harness.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use turnloop::backend::{ChatBackend, ChatRequest, ChunkStream};
use turnloop::engine::{ContinuationController, TurnRequest};
use turnloop::error::TurnError;
use turnloop::store::{MemoryStore, MessageStore};
use turnloop::tools::{FnTool, InternalToolRegistry, ToolDispatcher, ToolParameters};
use turnloop::types::*;

/// One canned response of a [`ScriptedBackend`].
pub enum Script {
    /// Yield these items, then end.
    Chunks(Vec<Result<ChatChunk, TurnError>>),
    /// Yield these items, then never yield again.
    Stall(Vec<ChatChunk>),
    /// Fail before streaming.
    Reject(TurnError),
}

/// A backend that plays back queued scripts and records every request.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream of chunks.
    pub fn queue(&self, chunks: Vec<ChatChunk>) -> &Self {
        self.push(Script::Chunks(chunks.into_iter().map(Ok).collect()))
    }

    pub fn push(&self, script: Script) -> &Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, TurnError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Chunks(items)) => Ok(futures::stream::iter(items).boxed()),
            Some(Script::Stall(chunks)) => Ok(futures::stream::iter(
                chunks.into_iter().map(Ok::<_, TurnError>),
            )
            .chain(futures::stream::pending())
            .boxed()),
            Some(Script::Reject(error)) => Err(error),
            None => Err(TurnError::InvalidState("script exhausted".into())),
        }
    }
}

/// A backend whose single stream is fed by the test through a channel.
pub struct ChannelBackend {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<ChatChunk, TurnError>>>>,
}

impl ChannelBackend {
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<ChatChunk, TurnError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait]
impl ChatBackend for ChannelBackend {
    fn name(&self) -> &str {
        "channel"
    }

    async fn stream_chat(&self, _request: &ChatRequest) -> Result<ChunkStream, TurnError> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TurnError::InvalidState("stream already taken".into()))?;
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Calls seen by recording tools, in execution order.
pub type CallLog = Arc<Mutex<Vec<(String, Value)>>>;

/// A tool that records its arguments and answers with `reply`.
pub fn recording_tool(name: &str, log: &CallLog, reply: Value) -> FnTool {
    let log = log.clone();
    let tool_name = name.to_string();
    FnTool::new(name, format!("records calls to {name}"), ToolParameters::empty(), move |args, _ctx| {
        log.lock().unwrap().push((tool_name.clone(), args));
        let reply = reply.clone();
        async move { Ok(reply) }
    })
}

/// A tool that sleeps before answering.
pub fn slow_tool(name: &str, delay: std::time::Duration) -> FnTool {
    FnTool::new(name, "sleeps", ToolParameters::empty(), move |_args, _ctx| async move {
        tokio::time::sleep(delay).await;
        Ok(serde_json::json!({ "slept_ms": delay.as_millis() as u64 }))
    })
}

pub struct Harness {
    pub controller: ContinuationController,
    pub store: Arc<MemoryStore>,
    pub session_id: SessionId,
}

impl Harness {
    pub async fn new(backend: Arc<dyn ChatBackend>, registry: InternalToolRegistry) -> Self {
        let store = Arc::new(MemoryStore::new());
        let session = store
            .create_session("test", ModelRef::new("openai", "gpt-test"), SessionSettings::default())
            .await
            .unwrap();
        let controller = ContinuationController::new(
            backend,
            ToolDispatcher::internal_only(registry),
            store.clone(),
        );
        Self {
            controller,
            store,
            session_id: session.id,
        }
    }

    pub fn request(&self, text: &str) -> TurnRequest {
        TurnRequest::builder()
            .session_id(self.session_id)
            .user_message(text)
            .build()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.store.list_messages(self.session_id).await.unwrap()
    }

    /// Content of the latest assistant message.
    pub async fn assistant_text(&self) -> String {
        self.store
            .find_latest_by_role(self.session_id, Role::Assistant)
            .await
            .unwrap()
            .map(|m| m.content)
            .unwrap_or_default()
    }
}

/// Decode every line the client received.
pub async fn drain(client: UnboundedReceiverStream<String>) -> Vec<ChatChunk> {
    client
        .map(|line| serde_json::from_str::<ChatChunk>(line.trim_end()).unwrap())
        .collect()
        .await
}

/// Concatenated content the client received.
pub fn client_text(chunks: &[ChatChunk]) -> String {
    chunks.iter().filter_map(ChatChunk::content_text).collect()
}

/// Fragments for one call split into the given argument pieces.
pub fn call_chunks(index: u32, id: &str, name: &str, pieces: &[&str]) -> Vec<ChatChunk> {
    let mut chunks = vec![ChatChunk::tool_calls(
        vec![ToolCallFragment::start(index, id, name)],
        None,
    )];
    for piece in pieces {
        chunks.push(ChatChunk::tool_calls(
            vec![ToolCallFragment::arguments(index, *piece)],
            None,
        ));
    }
    chunks
}

/// The terminal tool-calls signal.
pub fn finish_tool_calls() -> ChatChunk {
    ChatChunk::tool_calls(Vec::new(), Some(FinishReason::ToolCalls))
}
