//! In-process tools.
//!
//! A [`Tool`] is registered with an
//! [`InternalToolRegistry`](super::InternalToolRegistry) and reached through
//! the dispatcher when a completed call routes to
//! [`ToolRoute::Internal`](super::ToolRoute). Failures are returned as `Err`;
//! the dispatcher turns them into error results for the transcript.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::types::{ToolDefinition, ToolParameters};
use crate::error::TurnError;
use crate::types::SessionId;

/// The turn a call belongs to.
///
/// `session_id` is `None` only for calls made outside a turn.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: Option<SessionId>,
    /// Id the model gave the call; repeated in its directive.
    pub call_id: String,
}

impl ToolContext {
    pub fn new(session_id: SessionId, call_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id),
            call_id: call_id.into(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry name, without any group prefix.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &ToolParameters;

    /// Run with the call's arguments as the model sent them (after repair).
    async fn execute(
        &self,
        args: &serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, TurnError>;

    /// Definition advertised to the model under `exposed_name`.
    fn definition(&self, exposed_name: &str) -> ToolDefinition {
        ToolDefinition::new(exposed_name, self.description(), self.parameters().clone())
    }
}

type Handler = dyn Fn(
        serde_json::Value,
        ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, TurnError>> + Send>>
    + Send
    + Sync;

/// A [`Tool`] backed by an async closure.
pub struct FnTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<Handler>,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(serde_json::Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, TurnError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, TurnError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
