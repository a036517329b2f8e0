//! Error types for turnloop.

pub mod unified;

pub use unified::ErrorCategory;

use thiserror::Error;

use crate::types::{MessageId, SessionId};

/// Primary error type for all turnloop operations.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl TurnError {
    /// Create a backend error from an HTTP status and body.
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Backend { .. } => ErrorCategory::Backend,
            Self::Network(_) | Self::Stream(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::ToolExecution { .. } | Self::ToolNotFound(_) => ErrorCategory::Tool,
            Self::Persistence(_) | Self::SessionNotFound(_) | Self::MessageNotFound(_) => {
                ErrorCategory::Persistence
            }
            Self::Io(_) => ErrorCategory::Persistence,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::InvalidArgument(_) | Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this is a transient backend failure (network, timeout, 5xx).
    ///
    /// Transient failures are reported inline and end the turn; they are not
    /// retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend { status, .. } => matches!(status, 429 | 500..=599),
            _ => matches!(
                self.category(),
                ErrorCategory::Network | ErrorCategory::Timeout
            ),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TurnError>;
