use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub indexing: IndexingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            indexing: IndexingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory under which every session gets its own working tree
    /// and index store.
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/sessions"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexingConfig {
    /// File extension allow-list (without the leading dot).
    pub extensions: Vec<String>,
    /// Maximum chunk size in bytes.
    pub max_chunk_size: usize,
    /// Maximum overlap between adjacent chunks of the same file, in bytes.
    pub chunk_overlap: usize,
    /// Extra exclude globs on top of the built-in vendor/dependency set.
    pub exclude_globs: Vec<String>,
    /// Upper bound on a single clone operation.
    pub clone_timeout_secs: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string()],
            max_chunk_size: 2000,
            chunk_overlap: 200,
            exclude_globs: Vec::new(),
            clone_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved for a question.
    pub top_k: usize,
    /// Per-probe retrieval width during an audit.
    pub audit_k: usize,
    /// Cap on distinct chunks fed to one audit generation call.
    pub audit_max_chunks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            audit_k: 4,
            audit_max_chunks: 12,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model identifier sent to the service.
    pub model: String,
    /// Vector dimensionality the model produces.
    pub dims: usize,
    /// Number of texts per embedding request.
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dims: 1536,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat model identifier sent to the service.
    pub model: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_retries: 3,
            timeout_secs: 60,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.indexing.extensions.is_empty() {
        return Err(Error::Config(
            "indexing.extensions must list at least one extension".to_string(),
        ));
    }

    if config.indexing.max_chunk_size == 0 {
        return Err(Error::Config(
            "indexing.max_chunk_size must be > 0".to_string(),
        ));
    }

    // An overlap as large as the chunk size would index the same region
    // pathologically many times.
    if config.indexing.chunk_overlap >= config.indexing.max_chunk_size {
        return Err(Error::Config(
            "indexing.chunk_overlap must be smaller than indexing.max_chunk_size".to_string(),
        ));
    }

    if config.retrieval.top_k == 0 {
        return Err(Error::Config("retrieval.top_k must be >= 1".to_string()));
    }

    if config.retrieval.audit_k == 0 || config.retrieval.audit_max_chunks == 0 {
        return Err(Error::Config(
            "retrieval.audit_k and retrieval.audit_max_chunks must be >= 1".to_string(),
        ));
    }

    if config.embedding.dims == 0 {
        return Err(Error::Config("embedding.dims must be > 0".to_string()));
    }

    if config.embedding.batch_size == 0 {
        return Err(Error::Config("embedding.batch_size must be > 0".to_string()));
    }

    if config.embedding.model.is_empty() || config.generation.model.is_empty() {
        return Err(Error::Config(
            "embedding.model and generation.model must not be empty".to_string(),
        ));
    }

    Ok(())
}
