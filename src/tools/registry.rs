//! In-process tool registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::route::ToolRoute;
use super::tool::{Tool, ToolContext};
use super::types::ToolDefinition;
use crate::error::TurnError;

/// In-process tools keyed by the name the model calls them by.
#[derive(Default, Clone)]
pub struct InternalToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl InternalToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the tool's own name. Replaces an existing entry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        tracing::debug!(tool = %name, "registered internal tool");
        self.tools.insert(name, tool);
        self
    }

    /// Register under `internal_<group>_<name>`.
    pub fn register_grouped(&mut self, group: &str, tool: Arc<dyn Tool>) -> &mut Self {
        let name = ToolRoute::internal_name(group, tool.name());
        tracing::debug!(tool = %name, group, "registered internal tool");
        self.tools.insert(name, tool);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Advertised definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|(name, tool)| tool.definition(name))
            .collect()
    }

    pub async fn call(
        &self,
        name: &str,
        args: &serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, TurnError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| TurnError::ToolNotFound(name.to_string()))?;
        tool.execute(args, ctx).await
    }
}

impl std::fmt::Debug for InternalToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
