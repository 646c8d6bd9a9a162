//! Deterministic bag-of-words embedder.
//!
//! Each lowercased alphanumeric token is hashed (SHA-256) into one of `dims`
//! buckets with a hash-derived sign. Identical texts always produce identical
//! vectors, which makes it suitable for tests and offline runs. It carries no
//! semantics beyond shared vocabulary.

use sha2::{Digest, Sha256};
use vrag_core::error::{codes, AppError};

use super::Embedder;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub const MODEL: &'static str = "hash-bow-v1";

    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        if self.dims == 0 {
            return Err(AppError::new(
                codes::EMBEDDINGS_FAILED,
                "Hash embedder requires at least one dimension",
            ));
        }
        let mut v = vec![0.0f32; self.dims];
        for token in tokens(input) {
            let digest = Sha256::digest(token.as_bytes());
            let mut idx_bytes = [0u8; 8];
            idx_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(idx_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        Ok(v)
    }
}

fn tokens(input: &str) -> impl Iterator<Item = String> + '_ {
    input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}
