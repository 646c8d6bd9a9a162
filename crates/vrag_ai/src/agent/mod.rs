use std::time::Instant;

use serde::{Deserialize, Serialize};
use vrag_core::error::{codes, AppError};

use crate::embeddings::Embedder;
use crate::guardrails::{assess_grounding, GroundingAssessment};
use crate::knowledge::model::{META_GENE, META_PMID, META_SOURCE};
use crate::llm::Llm;
use crate::store::{RetrievalHit, RetrievalResult, VectorStore};

mod prompts;

pub const DEFAULT_TOP_K: u32 = 3;

/// Model output plus the evidence it was conditioned on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalReport {
    /// Raw model output, unmodified.
    pub text: String,
    pub evidence: Vec<RetrievalHit>,
    pub grounding: GroundingAssessment,
}

/// Retrieve, compose, generate. Holds no state between calls.
pub struct RagAgent<'a> {
    store: &'a VectorStore,
    embedder: &'a dyn Embedder,
    llm: &'a dyn Llm,
    model: String,
    top_k: u32,
}

impl<'a> RagAgent<'a> {
    pub fn new(
        store: &'a VectorStore,
        embedder: &'a dyn Embedder,
        llm: &'a dyn Llm,
        model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            model: model.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> u32 {
        self.top_k
    }

    pub fn answer(&self, question: &str) -> Result<String, AppError> {
        Ok(self.answer_with_evidence(question)?.text)
    }

    pub fn answer_with_evidence(&self, question: &str) -> Result<ClinicalReport, AppError> {
        let started = Instant::now();
        let retrieved = self.store.query(self.embedder, question, self.top_k)?;
        let prompt = self.compose_prompt(question, &retrieved);

        let text = self.llm.generate(&self.model, &prompt).map_err(|e| {
            let details = match e.details.as_deref() {
                Some(d) => format!("model={}; {}: {}; {d}", self.model, e.code, e.message),
                None => format!("model={}; {}: {}", self.model, e.code, e.message),
            };
            AppError::new(codes::GENERATION_FAILED, "Language model call failed")
                .with_details(details)
                .with_retryable(e.retryable)
        })?;

        let grounding = assess_grounding(&text, retrieved.texts());
        if grounding.is_weak() {
            tracing::warn!(
                supported = grounding.supported_terms,
                total = grounding.total_terms,
                "answer is weakly grounded in retrieved context"
            );
        }
        tracing::debug!(
            hits = retrieved.len(),
            fallback = grounding.is_fallback,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answer generated"
        );

        Ok(ClinicalReport {
            text,
            evidence: retrieved.hits,
            grounding,
        })
    }

    pub fn compose_prompt(&self, question: &str, retrieved: &RetrievalResult) -> String {
        prompts::clinical_answer_prompt(question.trim(), &build_context_blocks(retrieved))
    }
}

fn build_context_blocks(retrieved: &RetrievalResult) -> String {
    if retrieved.is_empty() {
        return "(no context retrieved)".to_string();
    }
    let meta = |hit: &RetrievalHit, key: &str| {
        hit.metadata
            .get(key)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    };
    retrieved
        .hits
        .iter()
        .map(|hit| {
            format!(
                "[[chunk:{}]] source={} gene={} pmid={}\n{}",
                hit.entry_id,
                meta(hit, META_SOURCE),
                meta(hit, META_GENE),
                meta(hit, META_PMID),
                hit.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
