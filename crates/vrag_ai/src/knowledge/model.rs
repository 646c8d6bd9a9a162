use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const META_SOURCE: &str = "source";
pub const META_GENE: &str = "gene";
pub const META_TOPIC: &str = "topic";
pub const META_PMID: &str = "pmid";

/// A fetched abstract, before chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeDocument {
    pub page_content: String,
    pub metadata: BTreeMap<String, String>,
}

impl KnowledgeDocument {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A bounded window of a document. `start`/`end` are character offsets into the
/// parent's content; `index` is the window's ordinal within that document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub index: u32,
    pub start: usize,
    pub end: usize,
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }

    /// Topic the chunk was ingested under (`topic`, else `gene`).
    pub fn topic(&self) -> &str {
        self.metadata
            .get(META_TOPIC)
            .or_else(|| self.metadata.get(META_GENE))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Identifier of the source record (`pmid`), if known.
    pub fn source_id(&self) -> Option<&str> {
        self.metadata.get(META_PMID).map(String::as_str)
    }
}
