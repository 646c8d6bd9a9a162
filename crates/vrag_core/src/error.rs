use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes shared by every stage of the pipeline.
pub mod codes {
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const SOURCE_UNAVAILABLE: &str = "SOURCE_UNAVAILABLE";
    pub const STORE_NOT_FOUND: &str = "STORE_NOT_FOUND";
    pub const STORE_FAILED: &str = "STORE_FAILED";
    pub const STORE_EMBEDDING_MISMATCH: &str = "STORE_EMBEDDING_MISMATCH";
    pub const EMBEDDINGS_FAILED: &str = "EMBEDDINGS_FAILED";
    pub const GENERATION_FAILED: &str = "GENERATION_FAILED";
    pub const RETRIEVAL_FAILED: &str = "RETRIEVAL_FAILED";
    pub const VCF_READ_FAILED: &str = "VCF_READ_FAILED";
    pub const VCF_PARSE_FAILED: &str = "VCF_PARSE_FAILED";
    pub const LLM_REMOTE_NOT_ALLOWED: &str = "LLM_REMOTE_NOT_ALLOWED";
    pub const LLM_UNREACHABLE: &str = "LLM_UNREACHABLE";
    pub const DB_OPEN_FAILED: &str = "DB_OPEN_FAILED";
    pub const DB_MIGRATION_FAILED: &str = "DB_MIGRATION_FAILED";
    pub const OUTPUT_FAILED: &str = "OUTPUT_FAILED";
}

/// Single structured error shape used across the ingest, retrieval and report layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(codes::CONFIG_INVALID, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(d) = self.details.as_deref() {
            write!(f, " ({d})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
