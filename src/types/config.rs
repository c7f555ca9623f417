//! Configuration types for Tangent.
//!
//! Configuration is read from `config.toml` in the platform config directory.
//! Every field has a default, so a missing file or a partial file is fine.
//!
//! # Examples
//!
//! ```
//! use tangent::types::config::{Config, StorageMode};
//!
//! let config: Config = toml::from_str(r#"
//!     model = "claude-opus-4-20250514"
//!     save_debounce_ms = 250
//!
//!     [storage]
//!     mode = "guest"
//! "#).unwrap();
//!
//! assert_eq!(config.storage, StorageMode::Guest);
//! assert!(config.reasoning_models.is_reasoning_model(&config.model));
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{TangentError, TangentResult};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default Anthropic API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

/// Model-id prefixes of models that expose a reasoning trace.
const DEFAULT_REASONING_PREFIXES: &[&str] = &[
    "claude-3-7-sonnet",
    "claude-sonnet-4",
    "claude-opus-4",
    "o1",
    "o3",
    "o4-mini",
    "deepseek-reasoner",
];

/// Decides whether a model produces thinking chunks worth recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReasoningModels(Vec<String>);

impl ReasoningModels {
    /// Creates a predicate from model-id prefixes.
    #[must_use]
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(prefixes.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if `model_id` starts with any configured prefix (case-insensitive).
    #[must_use]
    pub fn is_reasoning_model(&self, model_id: &str) -> bool {
        let model_id = model_id.to_lowercase();
        self.0
            .iter()
            .any(|prefix| model_id.starts_with(&prefix.to_lowercase()))
    }

    /// Returns the configured prefixes.
    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.0
    }
}

impl Default for ReasoningModels {
    fn default() -> Self {
        Self::new(DEFAULT_REASONING_PREFIXES.iter().copied())
    }
}

/// Where conversations are persisted.
///
/// The two modes are mutually exclusive for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StorageMode {
    /// File-backed storage keyed by user id.
    Remote {
        /// Storage directory; defaults to the platform data directory.
        #[serde(default)]
        dir: Option<PathBuf>,
    },

    /// In-memory cache for sessions without an identity.
    Guest,
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Remote { dir: None }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model identifier for requests.
    pub model: String,

    /// Maximum tokens per response.
    pub max_tokens: u32,

    /// Token budget for the reasoning trace of reasoning models.
    pub thinking_budget_tokens: u32,

    /// Models that stream thinking chunks.
    pub reasoning_models: ReasoningModels,

    /// Quiet period before a mutation is persisted.
    pub save_debounce_ms: u64,

    /// Persistence backend.
    pub storage: StorageMode,

    /// Identity used to key stored conversations.
    pub user_id: String,

    /// Base URL of the model API.
    pub api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8192,
            thinking_budget_tokens: 4096,
            reasoning_models: ReasoningModels::default(),
            save_debounce_ms: 1000,
            storage: StorageMode::default(),
            user_id: "default".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `TangentError::Config` if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> TangentResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            TangentError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&text)
            .map_err(|e| TangentError::config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Loads `config.toml` from the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_default() -> TangentResult<Self> {
        match crate::util::get_config_dir() {
            Some(dir) => Self::load(&dir.join("config.toml")),
            None => Ok(Self::default()),
        }
    }

    /// Returns the save debounce interval.
    #[must_use]
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Returns `true` if the configured model streams a reasoning trace.
    #[must_use]
    pub fn is_reasoning_model(&self) -> bool {
        self.reasoning_models.is_reasoning_model(&self.model)
    }
}
