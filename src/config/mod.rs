//! Configuration system (layered: code > env > TOML file).

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Deserialize;

use crate::error::TurnError;
use crate::persist::DEFAULT_RECOVERY_PROMPT;
use crate::tools::DEFAULT_TOOL_TIMEOUT;

/// Providers with built-in env mappings.
pub const KNOWN_PROVIDERS: [&str; 5] = ["openai", "deepseek", "ollama", "openrouter", "openai-compatible"];

pub const DEFAULT_MAX_CONTINUATIONS: u32 = 20;
pub const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Base URL used when none is configured. `openai-compatible` has none.
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        _ => None,
    }
}

/// Settings the continuation loop and dispatcher run with.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    /// Bound on each tool call; zero disables it.
    pub tool_timeout: Duration,
    pub max_continuations: u32,
    /// Longest wait for the next chunk; zero disables the bound.
    pub stream_idle_timeout: Duration,
    /// Instruction appended to recovery markers and notices.
    pub recovery_prompt: String,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            max_continuations: DEFAULT_MAX_CONTINUATIONS,
            stream_idle_timeout: DEFAULT_STREAM_IDLE_TIMEOUT,
            recovery_prompt: DEFAULT_RECOVERY_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    engine: EngineSection,
    #[serde(default)]
    providers: HashMap<String, ProviderSection>,
}

#[derive(Debug, Default, Deserialize)]
struct EngineSection {
    tool_timeout_secs: Option<u64>,
    max_continuations: Option<u32>,
    stream_idle_timeout_ms: Option<u64>,
    recovery_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderSection {
    api_key: Option<String>,
    base_url: Option<String>,
}

/// Layered configuration for the engine and its backends.
///
/// Later layers overwrite earlier ones: [`EngineConfig::load`] reads the TOML
/// file, then the environment, and setters called afterwards win over both.
#[derive(Clone)]
pub struct EngineConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
    settings: Arc<RwLock<LoopSettings>>,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<String> = read(&self.api_keys).keys().cloned().collect();
        providers.sort();
        f.debug_struct("EngineConfig")
            .field("providers_with_keys", &providers)
            .field("base_urls", &*read(&self.base_urls))
            .field("settings", &*read(&self.settings))
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn env_prefix(provider: &str) -> String {
    provider.to_uppercase().replace('-', "_")
}

impl EngineConfig {
    /// Empty config with default loop settings.
    pub fn new() -> Self {
        Self {
            api_keys: Arc::new(RwLock::new(HashMap::new())),
            base_urls: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(RwLock::new(LoopSettings::default())),
        }
    }

    /// Default config file location (`config.toml` in the project config dir).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "turnloop", "turnloop")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// File (if present), then environment.
    pub fn load() -> Result<Self, TurnError> {
        let config = match Self::default_path().filter(|p| p.exists()) {
            Some(path) => Self::from_file(&path)?,
            None => Self::new(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment only (`.env` is loaded first if present).
    pub fn from_env() -> Self {
        let config = Self::new();
        config.apply_env();
        config
    }

    pub fn from_file(path: &Path) -> Result<Self, TurnError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|error| match error {
            TurnError::Configuration(message) => {
                TurnError::Configuration(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, TurnError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| TurnError::Configuration(e.to_string()))?;
        let config = Self::new();
        {
            let mut settings = write(&config.settings);
            let engine = file.engine;
            if let Some(secs) = engine.tool_timeout_secs {
                settings.tool_timeout = Duration::from_secs(secs);
            }
            if let Some(max) = engine.max_continuations {
                settings.max_continuations = max;
            }
            if let Some(ms) = engine.stream_idle_timeout_ms {
                settings.stream_idle_timeout = Duration::from_millis(ms);
            }
            if let Some(prompt) = engine.recovery_prompt {
                settings.recovery_prompt = prompt;
            }
        }
        for (provider, section) in file.providers {
            if let Some(key) = section.api_key {
                config.set_api_key(&provider, key);
            }
            if let Some(url) = section.base_url {
                config.set_base_url(&provider, url);
            }
        }
        Ok(config)
    }

    /// Overlay environment variables onto this config.
    pub fn apply_env(&self) {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        for provider in KNOWN_PROVIDERS {
            let prefix = env_prefix(provider);
            if let Ok(key) = std::env::var(format!("{prefix}_API_KEY")) {
                self.set_api_key(provider, key);
            }
            if let Ok(url) = std::env::var(format!("{prefix}_BASE_URL")) {
                self.set_base_url(provider, url);
            }
        }

        if let Some(secs) = env_number::<u64>("TURNLOOP_TOOL_TIMEOUT_SECS") {
            self.set_tool_timeout(Duration::from_secs(secs));
        }
        if let Some(max) = env_number::<u32>("TURNLOOP_MAX_CONTINUATIONS") {
            self.set_max_continuations(max);
        }
        if let Some(ms) = env_number::<u64>("TURNLOOP_STREAM_IDLE_TIMEOUT_MS") {
            self.set_stream_idle_timeout(Duration::from_millis(ms));
        }
        if let Ok(prompt) = std::env::var("TURNLOOP_RECOVERY_PROMPT") {
            self.set_recovery_prompt(prompt);
        }
    }

    pub fn set_api_key(&self, provider: &str, key: String) {
        write(&self.api_keys).insert(provider.to_string(), key);
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        read(&self.api_keys).get(provider).cloned()
    }

    pub fn set_base_url(&self, provider: &str, url: String) {
        write(&self.base_urls).insert(provider.to_string(), url);
    }

    /// Configured base URL, else the provider's default.
    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        read(&self.base_urls)
            .get(provider)
            .cloned()
            .or_else(|| default_base_url(provider).map(str::to_string))
    }

    /// Known providers plus any provider mentioned by a key or base URL.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = KNOWN_PROVIDERS.iter().map(|p| p.to_string()).collect();
        names.extend(read(&self.api_keys).keys().cloned());
        names.extend(read(&self.base_urls).keys().cloned());
        names.into_iter().collect()
    }

    pub fn set_tool_timeout(&self, timeout: Duration) {
        write(&self.settings).tool_timeout = timeout;
    }

    pub fn set_max_continuations(&self, max: u32) {
        write(&self.settings).max_continuations = max;
    }

    pub fn set_stream_idle_timeout(&self, timeout: Duration) {
        write(&self.settings).stream_idle_timeout = timeout;
    }

    pub fn set_recovery_prompt(&self, prompt: String) {
        write(&self.settings).recovery_prompt = prompt;
    }

    pub fn loop_settings(&self) -> LoopSettings {
        read(&self.settings).clone()
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring non-numeric setting");
            None
        }
    }
}
