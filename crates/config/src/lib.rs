//! Configuration loading, validation, and management for Syllabus.
//!
//! Loads configuration from `~/.syllabus/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.syllabus/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Anthropic API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for both generation rounds
    #[serde(default = "default_model")]
    pub model: String,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// HTTP client timeout for a single model call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on a whole query (both rounds and tool dispatch).
    /// Defaults to twice the request timeout plus ten seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_timeout_secs: Option<u64>,

    /// Directory of course documents ingested by `syllabus ingest`
    #[serde(default = "default_docs_path")]
    pub docs_path: PathBuf,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub sessions: SessionConfig,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_max_tokens() -> u32 {
    800
}
fn default_temperature() -> f32 {
    0.0
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_docs_path() -> PathBuf {
    PathBuf::from("docs")
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .field("docs_path", &self.docs_path)
            .field("anthropic", &self.anthropic)
            .field("embedding", &self.embedding)
            .field("retrieval", &self.retrieval)
            .field("sessions", &self.sessions)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".into()
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_url(),
        }
    }
}

/// Which embedder feeds both indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// Sentence-transformer model run locally through fastembed
    #[default]
    Local,
    /// Deterministic feature hashing, for tests and air-gapped runs
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint
    Openai,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Model for the `openai` provider
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Model for the `local` provider
    #[serde(default = "default_local_model")]
    pub local_model: String,

    /// Texts per inference batch for the `local` provider
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_embedding_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Vector size for `hash` and `openai`; `local` takes it from the model
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_local_model() -> String {
    "all-minilm-l6-v2".into()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_dimensions() -> usize {
    384
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: default_embedding_model(),
            local_model: default_local_model(),
            batch_size: default_batch_size(),
            api_url: default_embedding_url(),
            api_key: None,
            dimensions: default_dimensions(),
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("local_model", &self.local_model)
            .field("batch_size", &self.batch_size)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// Storage backend for the catalog and content indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// JSON-lines files under `index_dir`
    #[default]
    File,
    /// Process-local, lost on exit
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunk budget in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters of trailing sentences carried into the next chunk
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Top-K for content search
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Best catalog similarity below this is a resolution miss
    #[serde(default = "default_min_course_similarity")]
    pub min_course_similarity: f32,

    #[serde(default)]
    pub backend: IndexBackend,

    /// Where the file backend keeps `catalog.jsonl` and `content.jsonl`.
    /// Defaults to `~/.syllabus/index`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_dir: Option<PathBuf>,
}

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_max_results() -> usize {
    5
}
fn default_min_course_similarity() -> f32 {
    0.25
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_results: default_max_results(),
            min_course_similarity: default_min_course_similarity(),
            backend: IndexBackend::default(),
            index_dir: None,
        }
    }
}

impl RetrievalConfig {
    pub fn index_dir(&self) -> PathBuf {
        self.index_dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("index"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Exchanges kept per session
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_max_history() -> usize {
    2
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.syllabus/config.toml).
    ///
    /// Also checks environment variables:
    /// - `SYLLABUS_API_KEY` (highest priority)
    /// - `ANTHROPIC_API_KEY`
    /// - `SYLLABUS_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Load `path`, then apply the same environment overrides as [`load`](Self::load).
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if let Ok(key) = std::env::var("SYLLABUS_API_KEY") {
            config.api_key = Some(key);
        } else if config.api_key.is_none() {
            config.api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        }

        if let Ok(model) = std::env::var("SYLLABUS_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".syllabus")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let r = &self.retrieval;
        if r.chunk_size == 0 {
            return Err(ConfigError::ValidationError("retrieval.chunk_size must be > 0".into()));
        }
        if r.chunk_overlap >= r.chunk_size {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_overlap must be smaller than chunk_size".into(),
            ));
        }
        if r.max_results == 0 {
            return Err(ConfigError::ValidationError("retrieval.max_results must be > 0".into()));
        }
        if !(-1.0..=1.0).contains(&r.min_course_similarity) {
            return Err(ConfigError::ValidationError(
                "retrieval.min_course_similarity must be between -1.0 and 1.0".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError("embedding.dimensions must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError("embedding.batch_size must be > 0".into()));
        }
        if self.query_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError("query_timeout_secs must be > 0".into()));
        }

        Ok(())
    }

    /// Budget for a whole query: the explicit setting, or room for two
    /// model calls at the request timeout.
    pub fn query_timeout_secs(&self) -> u64 {
        self.query_timeout_secs
            .unwrap_or_else(|| self.request_timeout_secs.saturating_mul(2).saturating_add(10))
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            query_timeout_secs: None,
            docs_path: default_docs_path(),
            anthropic: AnthropicConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
