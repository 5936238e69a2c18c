use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::RagError;
use crate::memory::MemoryStrategy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub expansion: ExpansionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
}

/// OpenAI-compatible chat endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "ai21/jamba-mini-1.7".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub enabled: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temperature: 0.3,
            max_tokens: 100,
        }
    }
}

/// Two-stage retrieval depths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Broad vector-search pass (k1)
    pub broad_k: usize,
    /// Passages kept after reranking (k2 < k1)
    pub rerank_k: usize,
    /// Restrict retrieval to one `source_dir`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            broad_k: 50,
            rerank_k: 15,
            source_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub max_history: usize,
    pub strategy: MemoryStrategy,
    pub summary_max_tokens: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history: 10,
            strategy: MemoryStrategy::SlidingWindow,
            summary_max_tokens: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Qdrant gRPC URL
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub collection: String,
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection: "documents".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Dimensionality the index was built with
    pub dimension: usize,
    /// Local model copies and hub downloads; `~/.lexrag/models` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".to_string(),
            dimension: 384,
            cache_dir: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    pub model: String,
    pub batch_size: usize,
    /// Token limit per (query, passage) pair
    pub max_length: usize,
    pub timeout_secs: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model: "cross-encoder/ms-marco-MiniLM-L-12-v2".to_string(),
            batch_size: 16,
            max_length: 512,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle longer than this are dropped
    pub idle_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { idle_ttl_secs: 1800 }
    }
}

impl Config {
    /// Load configuration: file, then environment overrides, then validation
    ///
    /// Without an explicit path the default file is used and created with
    /// defaults when missing. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path()?;
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    let config = Config::default();
                    config.save_to(&default_path)?;
                    config
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".lexrag"))
    }

    /// Where model files are looked up and downloaded
    pub fn model_cache_dir(&self) -> Option<PathBuf> {
        self.embedding
            .cache_dir
            .clone()
            .or_else(|| Self::home_dir().ok().map(|dir| dir.join("models")))
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> std::result::Result<(), RagError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENROUTER_API_KEY") {
            self.chat.api_key = Some(v);
        }
        if let Some(v) = get("LEXRAG_CHAT_BASE_URL") {
            self.chat.base_url = v;
        }
        if let Some(v) = get("LEXRAG_CHAT_MODEL") {
            self.chat.model = v;
        }
        if let Some(v) = get("QDRANT_URL") {
            self.vector_store.url = v;
        }
        if let Some(v) = get("QDRANT_API_KEY") {
            self.vector_store.api_key = Some(v);
        }
        if let Some(v) = get("QDRANT_COLLECTION") {
            self.vector_store.collection = v;
        }
        if let Some(v) = get("EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = get("RERANKER_MODEL") {
            self.reranker.model = v;
        }
        if let Some(v) = get("MODEL_CACHE_DIR") {
            self.embedding.cache_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MAX_CONVERSATION_HISTORY") {
            self.memory.max_history = parse_env("MAX_CONVERSATION_HISTORY", &v)?;
        }
        if let Some(v) = get("MEMORY_STRATEGY") {
            self.memory.strategy = v.parse::<MemoryStrategy>()?;
        }

        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> std::result::Result<(), RagError> {
        let fail = |msg: String| Err(RagError::ConfigError(msg));

        if self.retrieval.rerank_k == 0 {
            return fail("retrieval.rerank_k must be at least 1".to_string());
        }
        if self.retrieval.rerank_k >= self.retrieval.broad_k {
            return fail(format!(
                "retrieval.rerank_k ({}) must be smaller than retrieval.broad_k ({})",
                self.retrieval.rerank_k, self.retrieval.broad_k
            ));
        }
        if self.memory.max_history == 0 {
            return fail("memory.max_history must be at least 1".to_string());
        }
        for (name, temperature) in [
            ("generation.temperature", self.generation.temperature),
            ("expansion.temperature", self.expansion.temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return fail(format!("{} must be within [0, 2], got {}", name, temperature));
            }
        }
        for (name, secs) in [
            ("chat.timeout_secs", self.chat.timeout_secs),
            ("vector_store.timeout_secs", self.vector_store.timeout_secs),
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("reranker.timeout_secs", self.reranker.timeout_secs),
            ("sessions.idle_ttl_secs", self.sessions.idle_ttl_secs),
        ] {
            if secs == 0 {
                return fail(format!("{} must be positive", name));
            }
        }
        if self.embedding.dimension == 0 {
            return fail("embedding.dimension must be positive".to_string());
        }
        if self.reranker.batch_size == 0 || self.reranker.max_length == 0 {
            return fail("reranker.batch_size and reranker.max_length must be positive".to_string());
        }

        Ok(())
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.timeout_secs)
    }

    pub fn vector_store_timeout(&self) -> Duration {
        Duration::from_secs(self.vector_store.timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }

    pub fn reranker_timeout(&self) -> Duration {
        Duration::from_secs(self.reranker.timeout_secs)
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.sessions.idle_ttl_secs)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> std::result::Result<T, RagError> {
    value
        .trim()
        .parse()
        .map_err(|_| RagError::ConfigError(format!("{} has an invalid value: '{}'", key, value)))
}
