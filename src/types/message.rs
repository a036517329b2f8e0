//! Session and message records.

use std::fmt;

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Session identifier.
pub type SessionId = Uuid;

/// Message identifier. Stores hand these out in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation role of a persisted message.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Reference to the model serving a session: `provider` selects the backend,
/// `id` is the model name (optionally prefixed with `<provider>:`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub id: String,
    pub provider: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
        }
    }

    /// The model id as the backend expects it, without a `<provider>:` prefix.
    pub fn backend_id(&self) -> &str {
        self.id
            .strip_prefix(self.provider.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(&self.id)
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.id)
    }
}

/// Sampling parameters sent with a chat request.
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
}

impl GenerationParams {
    /// Overlay `self` (request overrides) on top of session defaults.
    pub fn over(&self, defaults: &GenerationParams) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature.or(defaults.temperature),
            top_p: self.top_p.or(defaults.top_p),
            presence_penalty: self.presence_penalty.or(defaults.presence_penalty),
            frequency_penalty: self.frequency_penalty.or(defaults.frequency_penalty),
        }
    }
}

/// Mutable per-session settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub title: Option<String>,
    /// Plain prompt text, or a multi-prompt JSON document.
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub params: GenerationParams,
}

#[derive(Deserialize)]
struct PromptSet {
    prompts: Vec<PromptEntry>,
    #[serde(default, rename = "mainPrompt")]
    main_prompt: Option<String>,
}

#[derive(Deserialize)]
struct PromptEntry {
    #[serde(default)]
    content: String,
    #[serde(default, rename = "isMain")]
    is_main: bool,
}

impl SessionSettings {
    /// Resolve the effective system prompt.
    ///
    /// A value starting with `{` that parses as `{"prompts": [...]}` yields
    /// its `mainPrompt` (or the entry flagged `isMain`); anything else is used
    /// verbatim.
    pub fn main_system_prompt(&self) -> Option<String> {
        let raw = self.system_prompt.as_deref()?;
        if raw.trim_start().starts_with('{') {
            if let Ok(set) = serde_json::from_str::<PromptSet>(raw) {
                let main = set
                    .main_prompt
                    .filter(|p| !p.is_empty())
                    .or_else(|| {
                        set.prompts
                            .into_iter()
                            .find(|p| p.is_main)
                            .map(|p| p.content)
                    })
                    .unwrap_or_default();
                return (!main.is_empty()).then_some(main);
            }
        }
        (!raw.is_empty()).then(|| raw.to_string())
    }
}

/// A conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub model: ModelRef,
    pub settings: SessionSettings,
    /// Last assistant message sealed by a completed tool round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: Role,
    /// Never null; may be empty for a placeholder.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub is_round_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a message.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    pub model: Option<String>,
    pub is_round_end: bool,
}

impl NewMessage {
    pub fn new(session_id: SessionId, role: Role, content: impl Into<String>) -> Self {
        Self {
            session_id,
            role,
            content: content.into(),
            model: None,
            is_round_end: false,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// A history entry as replayed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_round_end: bool,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_round_end: false,
        }
    }

    /// Whether this is an empty assistant placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.role == Role::Assistant && self.content.is_empty()
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            is_round_end: message.is_round_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_id_strips_provider_prefix() {
        assert_eq!(ModelRef::new("deepseek", "deepseek:chat").backend_id(), "chat");
        assert_eq!(ModelRef::new("ollama", "qwen3:8b").backend_id(), "qwen3:8b");
    }

    #[test]
    fn request_params_override_session_defaults() {
        let defaults = GenerationParams::builder()
            .temperature(0.2)
            .top_p(0.9)
            .build();
        let overrides = GenerationParams::builder().temperature(1.0).build();
        let merged = overrides.over(&defaults);
        assert_eq!(merged.temperature, Some(1.0));
        assert_eq!(merged.top_p, Some(0.9));
        assert_eq!(merged.presence_penalty, None);
    }

    #[test]
    fn main_system_prompt_reads_multi_prompt_document() {
        let settings = SessionSettings {
            system_prompt: Some(
                r#"{"prompts":[{"content":"a"},{"content":"b","isMain":true}]}"#.into(),
            ),
            ..Default::default()
        };
        assert_eq!(settings.main_system_prompt().as_deref(), Some("b"));

        let plain = SessionSettings {
            system_prompt: Some("{not json".into()),
            ..Default::default()
        };
        assert_eq!(plain.main_system_prompt().as_deref(), Some("{not json"));
    }
}
