//! Configuration management for SEOPilot
//!
//! Loads and saves the JSON settings file and resolves credentials, with
//! environment fallbacks for the provider keys.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, expand_home};

/// Errors in configuration handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Credentials and endpoint for one LLM backend
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// All configured LLM backends
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
}

/// Orchestration loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_time_budget_secs")]
    pub time_budget_secs: u64,
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: usize,
    #[serde(default = "default_memory_context_entries")]
    pub memory_context_entries: usize,
    /// Empty means every registered tool is allowed
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_steps: default_max_steps(),
            time_budget_secs: default_time_budget_secs(),
            memory_max_entries: default_memory_max_entries(),
            memory_context_entries: default_memory_context_entries(),
            allowed_tools: Vec::new(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_steps() -> u32 {
    6
}

fn default_time_budget_secs() -> u64 {
    60
}

fn default_memory_max_entries() -> usize {
    20
}

fn default_memory_context_entries() -> usize {
    6
}

fn default_flush_interval_secs() -> u64 {
    30
}

/// Embedding backend for the vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_embedding_model(),
            api_key: String::new(),
            api_base: None,
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Knowledge store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_dir")]
    pub dir: String,
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default = "default_index_path")]
    pub index_path: String,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dir: default_knowledge_dir(),
            max_content_chars: default_max_content_chars(),
            snippet_chars: default_snippet_chars(),
            default_limit: default_limit(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embeddings: EmbeddingsConfig::default(),
            index_path: default_index_path(),
        }
    }
}

fn default_knowledge_dir() -> String {
    "~/.seopilot/knowledge".to_string()
}

fn default_max_content_chars() -> usize {
    4000
}

fn default_snippet_chars() -> usize {
    300
}

fn default_limit() -> usize {
    5
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    120
}

fn default_index_path() -> String {
    "~/.seopilot/vectors.json".to_string()
}

/// Notification webhook settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub api_key: String,
}

/// Business data provider settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlacesConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_fetch_max_chars")]
    pub fetch_max_chars: usize,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub places: PlacesConfig,
    #[serde(default = "default_audits_dir")]
    pub audits_dir: String,
    #[serde(default = "default_leads_path")]
    pub leads_path: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_max_chars: default_fetch_max_chars(),
            notify: NotifyConfig::default(),
            places: PlacesConfig::default(),
            audits_dir: default_audits_dir(),
            leads_path: default_leads_path(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    8
}

fn default_fetch_max_chars() -> usize {
    20_000
}

fn default_audits_dir() -> String {
    "~/.seopilot/audits".to_string()
}

fn default_leads_path() -> String {
    "~/.seopilot/leads.json".to_string()
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub brain: BrainConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from specific location, falling back to defaults when absent
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("Reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("Writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Settings for the backend named in `brain.provider`
    pub fn active_provider(&self) -> &ProviderConfig {
        match self.brain.provider.as_str() {
            "anthropic" => &self.providers.anthropic,
            "openrouter" => &self.providers.openrouter,
            _ => &self.providers.openai,
        }
    }

    /// API key for the active backend, falling back to its environment variable
    pub fn api_key(&self) -> Option<String> {
        let key = self.active_provider().api_key.clone();
        if !key.is_empty() {
            return Some(key);
        }

        let var = match self.brain.provider.as_str() {
            "anthropic" => "ANTHROPIC_API_KEY",
            "openrouter" => "OPENROUTER_API_KEY",
            _ => "OPENAI_API_KEY",
        };
        std::env::var(var).ok().filter(|k| !k.is_empty())
    }

    /// Endpoint override for the active backend
    pub fn api_base(&self) -> Option<String> {
        self.active_provider()
            .api_base
            .clone()
            .filter(|b| !b.is_empty())
    }

    /// Model override: brain setting first, then the backend's own setting
    pub fn model(&self) -> Option<String> {
        self.brain
            .model
            .clone()
            .or_else(|| self.active_provider().model.clone())
            .filter(|m| !m.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Embedding key, falling back to the OpenAI key and then `OPENAI_API_KEY`
    pub fn embeddings_api_key(&self) -> Option<String> {
        let key = &self.knowledge.embeddings.api_key;
        if !key.is_empty() {
            return Some(key.clone());
        }
        let key = &self.providers.openai.api_key;
        if !key.is_empty() {
            return Some(key.clone());
        }
        std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())
    }

    pub fn knowledge_dir(&self) -> PathBuf {
        expand_home(&self.knowledge.dir)
    }

    pub fn vector_index_path(&self) -> PathBuf {
        expand_home(&self.knowledge.index_path)
    }

    pub fn audits_dir(&self) -> PathBuf {
        expand_home(&self.tools.audits_dir)
    }

    pub fn leads_path(&self) -> PathBuf {
        expand_home(&self.tools.leads_path)
    }

    /// Fetch timeout kept within single-digit seconds
    pub fn fetch_timeout_secs(&self) -> u64 {
        self.tools.fetch_timeout_secs.clamp(1, 9)
    }

    /// Chunk overlap, always smaller than the chunk size
    pub fn chunk_overlap(&self) -> usize {
        let size = self.knowledge.chunk_size.max(1);
        self.knowledge.chunk_overlap.min(size - 1)
    }
}

/// Write a default config if none exists and create the data directories
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("Config already exists at {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("Config written to {:?}", config_path);
    }

    let config = Config::load().await?;
    for dir in [config.knowledge_dir(), config.audits_dir()] {
        tokio::fs::create_dir_all(&dir).await?;
        info!("Directory ready at {:?}", dir);
    }

    Ok(config)
}
