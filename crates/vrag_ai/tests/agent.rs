use std::collections::BTreeMap;
use std::sync::Mutex;

use pretty_assertions::assert_eq;
use vrag_ai::agent::RagAgent;
use vrag_ai::embeddings::HashEmbedder;
use vrag_ai::guardrails::NO_EVIDENCE_FALLBACK;
use vrag_ai::knowledge::model::{META_GENE, META_PMID, META_SOURCE, META_TOPIC};
use vrag_ai::knowledge::Chunk;
use vrag_ai::llm::Llm;
use vrag_ai::store::VectorStore;
use vrag_core::error::AppError;

/// Does what the prompt asks: answers from the context when it mentions
/// `subject`, otherwise returns the instructed fallback line.
struct InstructionFollowingLlm {
    subject: String,
    prompts: Mutex<Vec<String>>,
}

impl InstructionFollowingLlm {
    fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .expect("lock")
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

impl Llm for InstructionFollowingLlm {
    fn generate(&self, _model: &str, prompt: &str) -> Result<String, AppError> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        let context = prompt
            .split("Research context:")
            .nth(1)
            .and_then(|rest| rest.split("Question:").next())
            .unwrap_or("");
        if !context.contains(&self.subject) && prompt.contains(NO_EVIDENCE_FALLBACK) {
            return Ok(NO_EVIDENCE_FALLBACK.to_string());
        }
        Ok(format!("{} variants increase cancer risk.", self.subject))
    }
}

struct FailingLlm {
    retryable: bool,
}

impl Llm for FailingLlm {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AppError> {
        Err(AppError::new("GENERATION_FAILED", "Failed to call generate endpoint")
            .with_details("connection refused")
            .with_retryable(self.retryable))
    }
}

fn chunk(topic: &str, pmid: &str, text: &str) -> Chunk {
    let mut metadata = BTreeMap::new();
    metadata.insert(META_SOURCE.to_string(), "PubMed".to_string());
    metadata.insert(META_GENE.to_string(), topic.to_string());
    metadata.insert(META_TOPIC.to_string(), topic.to_string());
    metadata.insert(META_PMID.to_string(), pmid.to_string());
    Chunk {
        text: text.to_string(),
        index: 0,
        start: 0,
        end: text.chars().count(),
        metadata,
    }
}

fn populated_store(dir: &std::path::Path, embedder: &HashEmbedder) -> VectorStore {
    let store = VectorStore::open(dir, HashEmbedder::MODEL);
    store
        .add(
            embedder,
            &[
                chunk("BRCA1", "1", "Gene: BRCA1\nTitle: X\nAbstract: BRCA1 mutations increase risk."),
                chunk("TP53", "2", "Gene: TP53\nTitle: Y\nAbstract: TP53 loss impairs apoptosis."),
                chunk("KRAS", "3", "Gene: KRAS\nTitle: Z\nAbstract: KRAS G12D drives pancreatic tumours."),
                chunk("EGFR", "4", "Gene: EGFR\nTitle: W\nAbstract: EGFR L858R responds to gefitinib."),
            ],
        )
        .expect("add");
    store
}

#[test]
fn unsupported_question_yields_literal_fallback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = HashEmbedder::new(128);
    let store = populated_store(dir.path(), &embedder);
    let llm = InstructionFollowingLlm::new("MLH1");
    let agent = RagAgent::new(&store, &embedder, &llm, "mock");

    let answer = agent
        .answer("What is the clinical significance of MLH1 in Lynch syndrome?")
        .expect("answer");
    assert_eq!(answer, "No clinical evidence found in local database.");
    assert!(llm.last_prompt().contains(NO_EVIDENCE_FALLBACK));
}

#[test]
fn question_without_searchable_terms_still_reaches_the_model() {
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = HashEmbedder::new(128);
    let store = populated_store(dir.path(), &embedder);
    let llm = InstructionFollowingLlm::new("MLH1");
    let agent = RagAgent::new(&store, &embedder, &llm, "mock");

    let report = agent.answer_with_evidence("???").expect("answer");
    assert_eq!(report.text, NO_EVIDENCE_FALLBACK);
    assert!(report.grounding.is_fallback);
    assert!(report.evidence.iter().all(|h| h.score == 0.0));
    assert!(llm.last_prompt().contains("Question:\n???"));
}

#[test]
fn prompt_embeds_top_three_chunks_verbatim() {
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = HashEmbedder::new(128);
    let store = populated_store(dir.path(), &embedder);
    let llm = InstructionFollowingLlm::new("BRCA1");
    let agent = RagAgent::new(&store, &embedder, &llm, "mock");

    let question = "Variant on Chromosome 17 at position 41276045. Ref: G, Alt: A. BRCA1";
    let report = agent.answer_with_evidence(question).expect("answer");
    assert_eq!(report.text, "BRCA1 variants increase cancer risk.");
    assert_eq!(report.evidence.len(), 3);
    assert!(!report.grounding.is_fallback);

    let prompt = llm.last_prompt();
    for hit in &report.evidence {
        assert!(prompt.contains(&hit.text), "missing chunk {}", hit.entry_id);
        assert!(prompt.contains(&format!("[[chunk:{}]]", hit.entry_id)));
    }
    assert!(prompt.contains(question));
    assert!(report.evidence[0].text.contains("BRCA1 mutations increase risk."));
}

#[test]
fn top_k_is_configurable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = HashEmbedder::new(128);
    let store = populated_store(dir.path(), &embedder);
    let llm = InstructionFollowingLlm::new("TP53");
    let agent = RagAgent::new(&store, &embedder, &llm, "mock").with_top_k(1);

    let report = agent.answer_with_evidence("TP53 apoptosis").expect("answer");
    assert_eq!(report.evidence.len(), 1);
}

#[test]
fn llm_failure_surfaces_as_generation_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = HashEmbedder::new(128);
    let store = populated_store(dir.path(), &embedder);
    let llm = FailingLlm { retryable: true };
    let agent = RagAgent::new(&store, &embedder, &llm, "llama3");

    let err = agent.answer("BRCA1").expect_err("llm down");
    assert_eq!(err.code, "GENERATION_FAILED");
    assert!(err.retryable);
    let details = err.details.unwrap_or_default();
    assert!(details.contains("model=llama3"));
    assert!(details.contains("connection refused"));
}

#[test]
fn empty_store_fails_before_calling_the_model() {
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = HashEmbedder::new(128);
    let store = VectorStore::open(dir.path().join("missing"), HashEmbedder::MODEL);
    let llm = InstructionFollowingLlm::new("BRCA1");
    let agent = RagAgent::new(&store, &embedder, &llm, "mock");

    let err = agent.answer("BRCA1").expect_err("no store");
    assert_eq!(err.code, "STORE_NOT_FOUND");
    assert!(llm.prompts.lock().expect("lock").is_empty());
}
