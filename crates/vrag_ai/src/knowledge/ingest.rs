use std::time::Instant;

use serde::Serialize;
use vrag_core::config::{validate_chunking, IngestConfig};
use vrag_core::error::AppError;

use super::chunking::split;
use super::model::{Chunk, KnowledgeDocument, META_GENE, META_PMID, META_SOURCE, META_TOPIC};
use super::pubmed::LiteratureSource;
use crate::embeddings::Embedder;
use crate::store::{AddSummary, VectorStore};

pub const SOURCE_LABEL: &str = "PubMed";

/// What happened for one topic.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct TopicReport {
    pub topic: String,
    pub hits: usize,
    pub documents: usize,
    pub skipped_missing_abstract: usize,
    pub chunks: usize,
    /// Set when the literature source failed for this topic.
    pub error: Option<AppError>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct IngestOutcome {
    pub chunks: Vec<Chunk>,
    pub topics: Vec<TopicReport>,
}

impl IngestOutcome {
    pub fn failed_topics(&self) -> impl Iterator<Item = &TopicReport> {
        self.topics.iter().filter(|t| t.error.is_some())
    }

    pub fn skipped_missing_abstract(&self) -> usize {
        self.topics.iter().map(|t| t.skipped_missing_abstract).sum()
    }
}

pub struct KnowledgeIngestor<'a> {
    source: &'a dyn LiteratureSource,
    max_results: u32,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl<'a> KnowledgeIngestor<'a> {
    /// Fails with `CONFIG_INVALID` on bad chunk parameters, before any fetching happens.
    pub fn new(source: &'a dyn LiteratureSource, cfg: &IngestConfig) -> Result<Self, AppError> {
        validate_chunking(cfg.chunk_size, cfg.chunk_overlap)?;
        Ok(Self {
            source,
            max_results: cfg.max_results.max(1),
            chunk_size: cfg.chunk_size,
            chunk_overlap: cfg.chunk_overlap,
        })
    }

    pub fn search_term(topic: &str) -> String {
        format!(
            "{topic}[Title/Abstract] AND (mutation[Title/Abstract] OR variant[Title/Abstract])"
        )
    }

    /// Fetch and chunk every topic. A failing topic is logged and recorded in its
    /// report; the remaining topics still run.
    pub fn ingest(&self, topics: &[String]) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();
        for topic in topics {
            let started = Instant::now();
            let mut report = TopicReport {
                topic: topic.clone(),
                ..TopicReport::default()
            };
            match self.ingest_topic(topic, &mut report) {
                Ok(chunks) => {
                    report.chunks = chunks.len();
                    tracing::info!(
                        topic = %topic,
                        hits = report.hits,
                        documents = report.documents,
                        skipped_missing_abstract = report.skipped_missing_abstract,
                        chunks = report.chunks,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "topic ingested"
                    );
                    outcome.chunks.extend(chunks);
                }
                Err(e) => {
                    tracing::error!(topic = %topic, error = %e, "topic ingestion failed; continuing");
                    report.error = Some(e);
                }
            }
            outcome.topics.push(report);
        }
        tracing::info!(
            topics = outcome.topics.len(),
            chunks = outcome.chunks.len(),
            failed = outcome.failed_topics().count(),
            "ingestion finished"
        );
        outcome
    }

    fn ingest_topic(&self, topic: &str, report: &mut TopicReport) -> Result<Vec<Chunk>, AppError> {
        let documents = self.fetch_documents(topic, report)?;
        let mut chunks = Vec::new();
        for doc in &documents {
            chunks.extend(split(doc, self.chunk_size, self.chunk_overlap)?);
        }
        Ok(chunks)
    }

    /// Search + fetch one topic and wrap each usable record as a document.
    pub fn fetch_documents(
        &self,
        topic: &str,
        report: &mut TopicReport,
    ) -> Result<Vec<KnowledgeDocument>, AppError> {
        let ids = self.source.search(&Self::search_term(topic), self.max_results)?;
        report.hits = ids.len();
        if ids.is_empty() {
            tracing::info!(topic = %topic, "no search hits; skipping topic");
            return Ok(Vec::new());
        }

        let articles = self.source.fetch(&ids)?;
        let mut docs = Vec::new();
        for article in articles {
            let (Some(title), Some(abstract_text)) = (article.title, article.abstract_text) else {
                report.skipped_missing_abstract += 1;
                tracing::debug!(topic = %topic, pmid = %article.pmid, "record has no abstract; skipped");
                continue;
            };
            docs.push(
                KnowledgeDocument::new(format!(
                    "Gene: {topic}\nTitle: {title}\nAbstract: {abstract_text}"
                ))
                .with_meta(META_SOURCE, SOURCE_LABEL)
                .with_meta(META_GENE, topic)
                .with_meta(META_TOPIC, topic)
                .with_meta(META_PMID, article.pmid),
            );
        }
        if report.skipped_missing_abstract > 0 {
            tracing::warn!(
                topic = %topic,
                skipped = report.skipped_missing_abstract,
                "records without an abstract were skipped"
            );
        }
        report.documents = docs.len();
        Ok(docs)
    }

    /// Embed and upsert chunks into the store.
    pub fn persist(
        &self,
        chunks: &[Chunk],
        store: &VectorStore,
        embedder: &dyn Embedder,
    ) -> Result<AddSummary, AppError> {
        let summary = store.add(embedder, chunks)?;
        tracing::info!(
            path = %store.root().display(),
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            removed = summary.removed,
            "chunks persisted"
        );
        Ok(summary)
    }
}
