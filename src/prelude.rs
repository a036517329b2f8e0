//! Convenience re-exports for common use.

pub use crate::backend::{BackendRouter, ChatBackend, ChatRequest, ChunkStream};
pub use crate::config::{EngineConfig, LoopSettings};
pub use crate::engine::{ChunkSink, ContinuationController, TurnOutcome, TurnRequest, TurnStatus};
pub use crate::error::{Result, TurnError};
pub use crate::store::{MemoryStore, MessageStore};
pub use crate::tools::{
    ExternalToolRegistry, FnTool, InternalToolRegistry, Tool, ToolContext, ToolDefinition,
    ToolDispatcher, ToolParameters, ToolServer,
};
pub use crate::types::{ChatChunk, ChatMessage, GenerationParams, ModelRef, Role};
