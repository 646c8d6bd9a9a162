use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Literal answer the model is instructed to give when the context does not
/// address the question.
pub const NO_EVIDENCE_FALLBACK: &str = "No clinical evidence found in local database.";

/// Below this share of supported terms an answer is logged as weakly grounded.
pub const WEAK_GROUNDING_RATIO: f32 = 0.5;

const MIN_TERM_CHARS: usize = 5;

pub fn is_fallback_answer(output: &str) -> bool {
    let trimmed = output
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim();
    trimmed == NO_EVIDENCE_FALLBACK
}

/// Lexical containment of an answer in its retrieved context.
///
/// Advisory only: the answer is never altered or rejected on the basis of this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GroundingAssessment {
    pub is_fallback: bool,
    pub supported_terms: usize,
    pub total_terms: usize,
}

impl GroundingAssessment {
    pub fn support_ratio(&self) -> f32 {
        if self.total_terms == 0 {
            return 1.0;
        }
        self.supported_terms as f32 / self.total_terms as f32
    }

    pub fn is_weak(&self) -> bool {
        !self.is_fallback && self.support_ratio() < WEAK_GROUNDING_RATIO
    }
}

pub fn assess_grounding<'a>(
    output: &str,
    contexts: impl IntoIterator<Item = &'a str>,
) -> GroundingAssessment {
    if is_fallback_answer(output) {
        return GroundingAssessment {
            is_fallback: true,
            ..GroundingAssessment::default()
        };
    }

    let mut context_terms = BTreeSet::new();
    for c in contexts {
        context_terms.extend(terms(c));
    }
    let answer_terms = terms(output);
    let supported = answer_terms
        .iter()
        .filter(|t| context_terms.contains(*t))
        .count();

    GroundingAssessment {
        is_fallback: false,
        supported_terms: supported,
        total_terms: answer_terms.len(),
    }
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_detection_tolerates_quotes_and_whitespace() {
        assert!(is_fallback_answer(NO_EVIDENCE_FALLBACK));
        assert!(is_fallback_answer(
            "  \"No clinical evidence found in local database.\"\n"
        ));
        assert!(!is_fallback_answer("No clinical evidence found."));
    }

    #[test]
    fn grounding_counts_terms_present_in_context() {
        let ctx = ["BRCA1 mutations increase breast cancer risk."];
        let a = assess_grounding("BRCA1 mutations increase risk", ctx);
        assert_eq!(a.total_terms, 3);
        assert_eq!(a.supported_terms, 3);
        assert!(!a.is_weak());

        let b = assess_grounding("Penetrance depends on ancestry cohorts", ctx);
        assert_eq!(b.supported_terms, 0);
        assert!(b.is_weak());
    }

    #[test]
    fn fallback_answer_is_never_weak() {
        let a = assess_grounding(NO_EVIDENCE_FALLBACK, std::iter::empty());
        assert!(a.is_fallback);
        assert!(!a.is_weak());
    }
}
