use pretty_assertions::assert_eq;
use vrag_ai::knowledge::model::{META_GENE, META_SOURCE};
use vrag_ai::knowledge::{reassemble, split, split_text, KnowledgeDocument};

/// Small deterministic generator so the corpus is the same on every run.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn synthetic_text(seed: u64, words: usize) -> String {
    const VOCAB: [&str; 12] = [
        "BRCA1", "variant", "pathogenic", "carriers", "risk", "ß-catenin", "mutation", "TP53",
        "cohort", "onset", "germline", "säure",
    ];
    let mut rng = Lcg(seed);
    let mut out = String::new();
    for i in 0..words {
        if i > 0 {
            out.push_str(match rng.next() % 10 {
                0 => ". ",
                1 => "\n",
                2 => "\n\n",
                _ => " ",
            });
        }
        out.push_str(VOCAB[(rng.next() % VOCAB.len() as u64) as usize]);
    }
    out
}

#[test]
fn chunks_respect_bounds_overlap_and_reconstruct_exactly() {
    let params = [(500, 50), (64, 8), (40, 0), (17, 16), (120, 60), (3, 1)];
    for seed in 1..=12u64 {
        let text = synthetic_text(seed, 40 + (seed as usize) * 17);
        let doc = KnowledgeDocument::new(text.clone());
        for (max_size, overlap) in params {
            let chunks = split(&doc, max_size, overlap).expect("split");
            assert!(!chunks.is_empty());
            for (i, c) in chunks.iter().enumerate() {
                assert_eq!(c.index as usize, i);
                assert!(c.char_len() <= max_size, "seed={seed} max={max_size}");
                assert_eq!(c.text.chars().count(), c.char_len());
            }
            for pair in chunks.windows(2) {
                assert_eq!(pair[1].start, pair[0].end - overlap);
            }
            assert_eq!(chunks.last().map(|c| c.end), Some(text.chars().count()));
            assert_eq!(reassemble(&chunks, overlap), text);
        }
    }
}

#[test]
fn short_abstract_yields_exactly_one_chunk() {
    let doc = KnowledgeDocument::new("Gene: BRCA1\nTitle: X\nAbstract: BRCA1 mutations increase risk.")
        .with_meta(META_SOURCE, "PubMed")
        .with_meta(META_GENE, "BRCA1");
    let chunks = split(&doc, 500, 50).expect("split");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, doc.page_content);
    assert_eq!(chunks[0].metadata, doc.metadata);
}

#[test]
fn windows_prefer_sentence_ends_over_mid_word_cuts() {
    let text = "BRCA1 carriers face elevated risk. Screening starts early. Surgery is discussed.";
    let spans = split_text(text, 40, 5).expect("split");
    let first: String = text.chars().take(spans[0].end).collect();
    assert_eq!(first, "BRCA1 carriers face elevated risk. ");
}

#[test]
fn invalid_chunk_parameters_are_configuration_errors() {
    let doc = KnowledgeDocument::new("text");
    let err = split(&doc, 10, 10).expect_err("overlap == max");
    assert_eq!(err.code, "CONFIG_INVALID");
    let err = split(&doc, 0, 0).expect_err("max == 0");
    assert_eq!(err.code, "CONFIG_INVALID");
}
