//! Out-of-process tool servers.
//!
//! Servers are started, stopped and health-checked by the host; this registry
//! only records what the host reports and routes calls to running servers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::RwLock;

use super::route::ToolRoute;
use super::types::{ToolDefinition, ToolParameters};
use crate::error::TurnError;

/// A tool as described by its server, before prefixing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "inputSchema")]
    pub parameters: ToolParameters,
}

/// Connection to one tool server.
#[async_trait]
pub trait ToolServer: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ServerTool>, TurnError>;

    async fn call_tool(
        &self,
        tool: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, TurnError>;
}

/// Health of a server as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServerStatus {
    Running,
    Stopped,
    Failed,
}

struct ServerEntry {
    server: Arc<dyn ToolServer>,
    status: ServerStatus,
    enabled: bool,
}

/// Tool servers keyed by server key.
#[derive(Default)]
pub struct ExternalToolRegistry {
    servers: RwLock<BTreeMap<String, ServerEntry>>,
}

impl ExternalToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server as running and enabled.
    pub async fn insert(&self, key: impl Into<String>, server: Arc<dyn ToolServer>) {
        let key = key.into();
        tracing::info!(server = %key, "tool server registered");
        self.servers.write().await.insert(
            key,
            ServerEntry {
                server,
                status: ServerStatus::Running,
                enabled: true,
            },
        );
    }

    pub async fn remove(&self, key: &str) -> bool {
        self.servers.write().await.remove(key).is_some()
    }

    pub async fn set_status(&self, key: &str, status: ServerStatus) -> Result<(), TurnError> {
        let mut servers = self.servers.write().await;
        let entry = servers
            .get_mut(key)
            .ok_or_else(|| TurnError::InvalidArgument(format!("unknown tool server {key}")))?;
        if entry.status != status {
            tracing::info!(server = %key, from = %entry.status, to = %status, "tool server status changed");
        }
        entry.status = status;
        Ok(())
    }

    pub async fn set_enabled(&self, key: &str, enabled: bool) -> Result<(), TurnError> {
        let mut servers = self.servers.write().await;
        let entry = servers
            .get_mut(key)
            .ok_or_else(|| TurnError::InvalidArgument(format!("unknown tool server {key}")))?;
        entry.enabled = enabled;
        Ok(())
    }

    pub async fn status(&self, key: &str) -> Option<(ServerStatus, bool)> {
        self.servers
            .read()
            .await
            .get(key)
            .map(|entry| (entry.status, entry.enabled))
    }

    fn available(entry: &ServerEntry) -> bool {
        entry.enabled && entry.status == ServerStatus::Running
    }

    /// Definitions from every running, enabled server.
    ///
    /// A server whose listing fails is logged and skipped.
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        let servers: Vec<(String, Arc<dyn ToolServer>)> = self
            .servers
            .read()
            .await
            .iter()
            .filter(|(_, entry)| Self::available(entry))
            .map(|(key, entry)| (key.clone(), Arc::clone(&entry.server)))
            .collect();

        let mut definitions = Vec::new();
        for (key, server) in servers {
            match server.list_tools().await {
                Ok(tools) => definitions.extend(tools.into_iter().map(|tool| {
                    ToolDefinition::new(
                        ToolRoute::external_name(&key, &tool.name),
                        tool.description,
                        tool.parameters,
                    )
                })),
                Err(error) => {
                    tracing::warn!(server = %key, %error, "skipping tool server whose listing failed");
                }
            }
        }
        definitions
    }

    /// Invoke `tool` on the server registered as `server_key`.
    pub async fn call(
        &self,
        server_key: &str,
        tool: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, TurnError> {
        let server = {
            let servers = self.servers.read().await;
            let entry = servers.get(server_key).ok_or_else(|| {
                TurnError::ToolNotFound(ToolRoute::external_name(server_key, tool))
            })?;
            if !Self::available(entry) {
                return Err(TurnError::tool(
                    tool,
                    format!(
                        "tool server {server_key} is not available (status {}, enabled {})",
                        entry.status, entry.enabled
                    ),
                ));
            }
            Arc::clone(&entry.server)
        };
        server.call_tool(tool, args).await
    }
}

impl std::fmt::Debug for ExternalToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalToolRegistry").finish_non_exhaustive()
    }
}
