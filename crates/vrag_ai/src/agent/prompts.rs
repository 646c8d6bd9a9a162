use crate::guardrails::NO_EVIDENCE_FALLBACK;

pub fn clinical_answer_prompt(question: &str, context_blocks: &str) -> String {
    // Contract with the model:
    // - answer only from the context chunks;
    // - otherwise reply with the exact fallback line.
    format!(
        r#"You are a clinical geneticist assistant.

Rules (non-negotiable):
1) Answer strictly from the research context chunks provided below. Do not use outside knowledge.
2) Describe the specific clinical implications of the variant or question, citing chunks as [[chunk:<id>]] where possible.
3) If the context does not address the question, respond with exactly this sentence and nothing else:
{NO_EVIDENCE_FALLBACK}

Research context:
{context_blocks}

Question:
{question}
"#
    )
}
