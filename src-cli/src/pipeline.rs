use std::time::Duration;

use vrag_ai::embeddings::{Embedder, HashEmbedder, OllamaEmbedder};
use vrag_ai::knowledge::PubMedClient;
use vrag_ai::llm::OllamaLlm;
use vrag_ai::ollama::OllamaClient;
use vrag_ai::retry::RetryPolicy;
use vrag_ai::store::VectorStore;
use vrag_core::config::{EmbeddingProvider, PipelineConfig};
use vrag_core::error::AppError;

/// Components wired from one validated config. Nothing here holds global state.
pub struct Pipeline {
    pub config: PipelineConfig,
    embedder: Box<dyn Embedder>,
    embedding_model: String,
}

impl Pipeline {
    pub fn from_config(config: PipelineConfig) -> Result<Self, AppError> {
        let (embedder, embedding_model): (Box<dyn Embedder>, String) =
            match config.ollama.embedding_provider {
                EmbeddingProvider::Ollama => {
                    let client = OllamaClient::new(&config.ollama.base_url)?;
                    let embedder = OllamaEmbedder::new(client)
                        .with_timeout(Duration::from_secs(config.ollama.embedding_timeout_secs))
                        .with_retry(RetryPolicy::from_config(&config.retry));
                    (Box::new(embedder), config.ollama.embedding_model.clone())
                }
                EmbeddingProvider::Hash => (
                    Box::new(HashEmbedder::new(config.ollama.hash_dims)),
                    HashEmbedder::MODEL.to_string(),
                ),
            };

        Ok(Self {
            config,
            embedder,
            embedding_model,
        })
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn store(&self) -> VectorStore {
        VectorStore::open(&self.config.store.path, &self.embedding_model)
    }

    pub fn literature_source(&self) -> PubMedClient {
        PubMedClient::new(&self.config.ingest, RetryPolicy::from_config(&self.config.retry))
    }

    pub fn llm(&self) -> Result<OllamaLlm, AppError> {
        let client = OllamaClient::new(&self.config.ollama.base_url)?;
        let retry = RetryPolicy::from_config(&self.config.retry)
            .with_max_attempts(self.config.ollama.generation_attempts);
        Ok(OllamaLlm::new(client)
            .with_timeout(Duration::from_secs(self.config.ollama.generation_timeout_secs))
            .with_retry(retry))
    }

    pub fn ollama_client(&self) -> Result<OllamaClient, AppError> {
        OllamaClient::new(&self.config.ollama.base_url)
    }
}
