use std::time::Duration;

use serde::{Deserialize, Serialize};
use vrag_core::error::{codes, AppError};

use super::Embedder;
use crate::ollama::OllamaClient;
use crate::retry::RetryPolicy;

// Chunking keeps inputs small; this only guards oversized queries.
const MAX_INPUT_CHARS: usize = 12_000;

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn embed_once(&self, model: &str, prompt: &str) -> Result<Vec<f32>, AppError> {
        let url = format!("{}/api/embeddings", self.client.base_url());
        let req = EmbeddingsRequest { model, prompt };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new(codes::EMBEDDINGS_FAILED, "Failed to encode embeddings request")
                .with_details(e.to_string())
        })?;

        match ureq::post(&url).timeout(self.timeout).send_json(body) {
            Ok(r) => {
                let v: EmbeddingsResponse = r.into_json().map_err(|e| {
                    AppError::new(codes::EMBEDDINGS_FAILED, "Failed to decode embeddings response")
                        .with_details(e.to_string())
                })?;
                if v.embedding.is_empty() {
                    return Err(AppError::new(
                        codes::EMBEDDINGS_FAILED,
                        "Embeddings response was empty",
                    )
                    .with_details(format!("model={model}")));
                }
                Ok(v.embedding)
            }
            Err(ureq::Error::Status(status, _)) => Err(AppError::new(
                codes::EMBEDDINGS_FAILED,
                "Embeddings request failed",
            )
            .with_details(format!("model={model}; status={status}"))
            .with_retryable(status >= 500)),
            Err(e) => Err(AppError::new(
                codes::EMBEDDINGS_FAILED,
                "Failed to call embeddings endpoint",
            )
            .with_details(e.to_string())
            .with_retryable(true)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let prompt = match input.char_indices().nth(MAX_INPUT_CHARS) {
            Some((cut, _)) => &input[..cut],
            None => input,
        };
        self.retry.run("ollama.embeddings", || self.embed_once(model, prompt))
    }
}
