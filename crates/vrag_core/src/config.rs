//! Pipeline configuration.
//!
//! Every setting has a default, so an absent or partial TOML file is valid.
//! Nothing here is global: the binary loads one `PipelineConfig` and hands the
//! relevant sections to each component at construction.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub store: StoreConfig,
    pub ingest: IngestConfig,
    pub ollama: OllamaConfig,
    pub retrieval: RetrievalConfig,
    pub report: ReportConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the persisted vector index.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/vector_store"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub topics: Vec<String>,
    /// Upper bound on search hits fetched per topic.
    pub max_results: u32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Contact address sent to NCBI with every request.
    pub email: String,
    pub tool: String,
    pub api_key: Option<String>,
    /// Restrict searches to publications from the last N days. `None` searches the full catalog.
    pub recent_days: Option<u32>,
    pub eutils_base_url: String,
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            topics: ["BRCA1", "TP53", "EGFR", "KRAS"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_results: 10,
            chunk_size: 500,
            chunk_overlap: 50,
            email: "your.email@example.com".to_string(),
            tool: "vrag".to_string(),
            api_key: None,
            recent_days: None,
            eutils_base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    Ollama,
    /// Deterministic feature-hashing embedder; no model server required.
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    /// Vector width used by the hash embedder.
    pub hash_dims: usize,
    pub generation_model: String,
    pub embedding_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    /// Total attempts per generation call; 1 disables retries.
    pub generation_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            embedding_provider: EmbeddingProvider::Ollama,
            embedding_model: "all-minilm".to_string(),
            hash_dims: 256,
            generation_model: "llama3".to_string(),
            embedding_timeout_secs: 10,
            generation_timeout_secs: 120,
            generation_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// What the report driver does when a record fails.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Yield the error and end the stream.
    #[default]
    Abort,
    /// Yield the error and keep going with the next record.
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    /// Records must have QUAL strictly greater than this.
    pub min_quality: f64,
    pub on_error: ErrorPolicy,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_quality: 50.0,
            on_error: ErrorPolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts for literature and embedding calls, including the first.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file, or use defaults when no path is given. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let config = match path {
            Some(p) => {
                let raw = fs::read_to_string(p).map_err(|e| {
                    AppError::config("Failed to read config file")
                        .with_details(format!("path={}; err={}", p.display(), e))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| {
            AppError::config("Failed to parse config file").with_details(e.to_string())
        })
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.ingest.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(AppError::config("retrieval.top_k must be at least 1"));
        }
        if !self.report.min_quality.is_finite() {
            return Err(AppError::config("report.min_quality must be a finite number"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::config("retry.max_attempts must be at least 1"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(AppError::config("retry.backoff_multiplier must be >= 1.0"));
        }
        if self.ollama.generation_attempts == 0 {
            return Err(AppError::config("ollama.generation_attempts must be at least 1"));
        }
        if self.ollama.embedding_provider == EmbeddingProvider::Hash && self.ollama.hash_dims == 0 {
            return Err(AppError::config("ollama.hash_dims must be at least 1"));
        }
        Ok(())
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.max_results == 0 {
            return Err(AppError::config("ingest.max_results must be at least 1"));
        }
        if self.email.trim().is_empty() {
            return Err(AppError::config("ingest.email is required by NCBI E-utilities"));
        }
        Ok(())
    }
}

/// Chunk window constraints: `max_size > 0` and `overlap < max_size`.
pub fn validate_chunking(max_size: usize, overlap: usize) -> Result<(), AppError> {
    if max_size == 0 {
        return Err(AppError::config("chunk_size must be greater than 0")
            .with_details(format!("chunk_size={max_size}")));
    }
    if overlap >= max_size {
        return Err(
            AppError::config("chunk_overlap must be less than chunk_size")
                .with_details(format!("chunk_size={max_size}; chunk_overlap={overlap}")),
        );
    }
    Ok(())
}
