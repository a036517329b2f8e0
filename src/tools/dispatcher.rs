//! Tool dispatch with timeout and fault isolation.

use std::sync::Arc;
use std::time::Duration;

use super::external::ExternalToolRegistry;
use super::registry::InternalToolRegistry;
use super::route::ToolRoute;
use super::tool::ToolContext;
use super::types::{ToolDefinition, ToolResult};
use crate::types::{CompletedToolCall, SessionId};
use crate::util::timeout::with_optional_timeout;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Results of a batch, and whether it stopped before its last call.
#[derive(Debug, Clone, Default)]
pub struct BatchRun {
    pub results: Vec<ToolResult>,
    pub interrupted: bool,
}

/// Routes completed calls to the internal registry or a tool server.
///
/// Every call is bounded by the dispatcher timeout (zero disables it), and
/// every failure comes back as an error [`ToolResult`] rather than an `Err`.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    internal: Arc<InternalToolRegistry>,
    external: Arc<ExternalToolRegistry>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(internal: Arc<InternalToolRegistry>, external: Arc<ExternalToolRegistry>) -> Self {
        Self {
            internal,
            external,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Dispatcher with only in-process tools.
    pub fn internal_only(internal: InternalToolRegistry) -> Self {
        Self::new(Arc::new(internal), Arc::new(ExternalToolRegistry::new()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn external(&self) -> &Arc<ExternalToolRegistry> {
        &self.external
    }

    /// Execute one call.
    pub async fn run(&self, call: &CompletedToolCall, ctx: &ToolContext) -> ToolResult {
        tracing::info!(
            tool = %call.name,
            call_id = %call.id,
            route = %call.route,
            source = %call.source,
            "dispatching tool call"
        );

        let invocation = async {
            match &call.route {
                ToolRoute::Internal { name } => self.internal.call(name, &call.arguments, ctx).await,
                ToolRoute::External { server_key, tool } => {
                    self.external.call(server_key, tool, &call.arguments).await
                }
            }
        };

        match with_optional_timeout(self.timeout, invocation).await {
            Ok(result) => {
                ToolResult::success(&call.id, &call.name, call.arguments.clone(), result)
            }
            Err(error) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, %error, "tool call failed");
                ToolResult::failure(
                    &call.id,
                    &call.name,
                    call.arguments.clone(),
                    error.to_string(),
                )
            }
        }
    }

    /// Execute a batch one call at a time, in order.
    ///
    /// `stop` is checked before each call; once it returns true the remaining
    /// calls are skipped. A call already running is left to finish.
    pub async fn run_batch(
        &self,
        calls: &[CompletedToolCall],
        session_id: SessionId,
        stop: impl Fn() -> bool,
    ) -> BatchRun {
        let mut run = BatchRun {
            results: Vec::with_capacity(calls.len()),
            interrupted: false,
        };
        for call in calls {
            if stop() {
                tracing::info!(
                    %session_id,
                    skipped = calls.len() - run.results.len(),
                    "skipping remaining tool calls"
                );
                run.interrupted = true;
                break;
            }
            let ctx = ToolContext::new(session_id, &call.id);
            run.results.push(self.run(call, &ctx).await);
        }
        run
    }

    /// Tools to advertise: available external tools, then internal ones.
    pub async fn available_tools(&self) -> Vec<ToolDefinition> {
        let mut tools = self.external.definitions().await;
        tools.extend(self.internal.definitions());
        tools
    }
}
