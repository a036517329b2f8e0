//! Model backends: the streaming chat collaborator and its implementations.

pub mod http;

#[cfg(feature = "openai-compatible")]
pub mod openai;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::TurnError;
use crate::tools::ToolDefinition;
use crate::types::{ChatChunk, ChatMessage, GenerationParams, ModelRef};

/// Stream of chunks produced by one model request.
pub type ChunkStream = BoxStream<'static, Result<ChatChunk, TurnError>>;

/// A streaming chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: ModelRef,
    /// History as stored, including empty placeholders; backends shape it.
    pub messages: Vec<ChatMessage>,
    pub system_prompt: Option<String>,
    pub params: GenerationParams,
    pub tools: Option<Vec<ToolDefinition>>,
    /// Retrieved reference material to put in front of the model.
    pub context: Option<String>,
}

/// A model backend that streams chat completion chunks.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Start a streaming completion. Errors before the first chunk are
    /// returned directly; later ones arrive in the stream.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, TurnError>;
}

/// Routes requests to a backend by the model's provider.
#[derive(Default, Clone)]
pub struct BackendRouter {
    backends: BTreeMap<String, Arc<dyn ChatBackend>>,
}

impl BackendRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, provider: impl Into<String>, backend: Arc<dyn ChatBackend>) -> Self {
        self.insert(provider, backend);
        self
    }

    pub fn insert(&mut self, provider: impl Into<String>, backend: Arc<dyn ChatBackend>) {
        self.backends.insert(provider.into(), backend);
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    /// One OpenAI-compatible backend per provider that has a base URL.
    #[cfg(feature = "openai-compatible")]
    pub fn from_config(config: &crate::config::EngineConfig) -> Self {
        let mut router = Self::new();
        for provider in config.provider_names() {
            let Some(base_url) = config.get_base_url(&provider) else {
                continue;
            };
            let backend = openai::OpenAiCompatibleBackend::new(
                provider.clone(),
                config.get_api_key(&provider),
                base_url,
            );
            router.insert(provider, Arc::new(backend));
        }
        router
    }
}

#[async_trait]
impl ChatBackend for BackendRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, TurnError> {
        let backend = self.backends.get(&request.model.provider).ok_or_else(|| {
            TurnError::Configuration(format!(
                "no backend configured for provider '{}'",
                request.model.provider
            ))
        })?;
        backend.stream_chat(request).await
    }
}

impl std::fmt::Debug for BackendRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRouter")
            .field("providers", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}
