use vrag_core::error::AppError;

/// Text to fixed-width vector. Ingestion and querying must use the same model.
pub trait Embedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod hashing;
pub mod ollama_embed;

pub use hashing::HashEmbedder;
pub use ollama_embed::OllamaEmbedder;
