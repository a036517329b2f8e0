//! Tool name routing.
//!
//! Tool names carry their routing in a prefix:
//! - `mcp_<serverKey>_<tool>` goes to an external tool server
//! - everything else (including `internal_<group>_<name>`) goes to the
//!   in-process registry under its full name

use std::fmt;

use serde::{Deserialize, Serialize};

pub const EXTERNAL_PREFIX: &str = "mcp";
pub const INTERNAL_PREFIX: &str = "internal";

/// Where a tool call is executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolRoute {
    Internal { name: String },
    External { server_key: String, tool: String },
}

impl ToolRoute {
    /// Resolve a model-facing tool name.
    ///
    /// An `mcp_` name needs both a server key and a tool name; the tool part
    /// keeps any further underscores. Malformed `mcp_` names fall through to
    /// the internal registry, which reports them as unknown.
    pub fn resolve(name: &str) -> Self {
        let mut parts = name.splitn(3, '_');
        if let (Some(EXTERNAL_PREFIX), Some(server_key), Some(tool)) =
            (parts.next(), parts.next(), parts.next())
        {
            if !server_key.is_empty() && !tool.is_empty() {
                return Self::External {
                    server_key: server_key.to_string(),
                    tool: tool.to_string(),
                };
            }
        }
        Self::Internal {
            name: name.to_string(),
        }
    }

    /// Name under which an external tool is advertised to the model.
    pub fn external_name(server_key: &str, tool: &str) -> String {
        format!("{EXTERNAL_PREFIX}_{server_key}_{tool}")
    }

    /// Name under which a grouped internal tool is advertised.
    pub fn internal_name(group: &str, tool: &str) -> String {
        format!("{INTERNAL_PREFIX}_{group}_{tool}")
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External { .. })
    }
}

impl fmt::Display for ToolRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal { name } => write!(f, "internal:{name}"),
            Self::External { server_key, tool } => write!(f, "{server_key}:{tool}"),
        }
    }
}
