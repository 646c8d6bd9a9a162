//! Overlapping window splitter.
//!
//! Windows hold at most `max_size` characters and each window after the first
//! starts exactly `overlap` characters before the previous one ends, so the
//! original text is recovered by dropping the first `overlap` characters of
//! every chunk but the first and concatenating. Window ends snap back to the
//! coarsest natural boundary available: paragraph, line, sentence, word, and
//! only then a hard cut.

use vrag_core::config::validate_chunking;
use vrag_core::error::AppError;

use super::model::{Chunk, KnowledgeDocument};

const BOUNDARIES: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Character range `[start, end)` of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

pub fn split_text(text: &str, max_size: usize, overlap: usize) -> Result<Vec<ChunkSpan>, AppError> {
    validate_chunking(max_size, overlap)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, including the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    let mut spans = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + max_size).min(total);
        if hard_end == total {
            spans.push(ChunkSpan { start, end: total });
            break;
        }
        let end = window_end(text, &offsets, start, hard_end, max_size, overlap);
        spans.push(ChunkSpan { start, end });
        start = end - overlap;
    }
    Ok(spans)
}

fn window_end(
    text: &str,
    offsets: &[usize],
    start: usize,
    hard_end: usize,
    max_size: usize,
    overlap: usize,
) -> usize {
    // Must stay past the overlap so the next window advances.
    let min_end = start + (overlap + 1).max(max_size / 2);
    if min_end >= hard_end {
        return hard_end;
    }

    let window = &text[offsets[start]..offsets[hard_end]];
    for sep in BOUNDARIES {
        if let Some(pos) = window.rfind(sep) {
            let cut_byte = offsets[start] + pos + sep.len();
            let cut = offsets.binary_search(&cut_byte).unwrap_or_else(|i| i);
            if cut >= min_end {
                return cut;
            }
        }
    }
    hard_end
}

/// Split one document; every chunk inherits the document's metadata.
pub fn split(
    document: &KnowledgeDocument,
    max_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, AppError> {
    let text = document.page_content.as_str();
    let spans = split_text(text, max_size, overlap)?;
    if spans.is_empty() {
        return Ok(Vec::new());
    }

    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    Ok(spans
        .into_iter()
        .enumerate()
        .map(|(i, span)| Chunk {
            text: text[offsets[span.start]..offsets[span.end]].to_string(),
            index: i as u32,
            start: span.start,
            end: span.end,
            metadata: document.metadata.clone(),
        })
        .collect())
}

pub fn split_documents(
    documents: &[KnowledgeDocument],
    max_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, AppError> {
    let mut out = Vec::new();
    for doc in documents {
        out.extend(split(doc, max_size, overlap)?);
    }
    Ok(out)
}

/// Inverse of [`split`] for chunks of a single document.
pub fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
    let mut out = String::new();
    for (i, c) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&c.text);
        } else {
            out.extend(c.text.chars().skip(overlap));
        }
    }
    out
}
