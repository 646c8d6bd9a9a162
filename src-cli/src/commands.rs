use std::path::Path;

use serde::Serialize;
use vrag_ai::agent::RagAgent;
use vrag_ai::knowledge::model::META_PMID;
use vrag_ai::knowledge::KnowledgeIngestor;
use vrag_ai::report::{render_variant_text, ReportDriver};
use vrag_core::error::{codes, AppError};

use crate::pipeline::Pipeline;
use crate::OutputFormat;

const RULE: &str = "--------------------------------------------------";

pub fn ingest(pipeline: &Pipeline, topics: Vec<String>, format: &OutputFormat) -> Result<(), AppError> {
    let topics = if topics.is_empty() {
        pipeline.config.ingest.topics.clone()
    } else {
        topics
    };

    let source = pipeline.literature_source();
    let ingestor = KnowledgeIngestor::new(&source, &pipeline.config.ingest)?;
    let outcome = ingestor.ingest(&topics);
    let store = pipeline.store();
    let summary = ingestor.persist(&outcome.chunks, &store, pipeline.embedder())?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "store": store.root().display().to_string(),
            "topics": outcome.topics,
            "summary": summary,
        })),
        OutputFormat::Plain => {
            for t in &outcome.topics {
                match &t.error {
                    Some(e) => println!("{}: failed ({e})", t.topic),
                    None => println!(
                        "{}: {} hits, {} documents, {} skipped without abstract, {} chunks",
                        t.topic, t.hits, t.documents, t.skipped_missing_abstract, t.chunks
                    ),
                }
            }
            println!(
                "store {}: {} inserted, {} updated, {} unchanged, {} removed",
                store.root().display(),
                summary.inserted,
                summary.updated,
                summary.unchanged,
                summary.removed
            );
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct EvidenceLine<'a> {
    rank: u32,
    entry_id: &'a str,
    score: f32,
    pmid: Option<&'a str>,
}

pub fn analyze(pipeline: &Pipeline, vcf: &Path, format: &OutputFormat) -> Result<(), AppError> {
    let store = pipeline.store();
    let llm = pipeline.llm()?;
    let agent = RagAgent::new(
        &store,
        pipeline.embedder(),
        &llm,
        pipeline.config.ollama.generation_model.clone(),
    )
    .with_top_k(pipeline.config.retrieval.top_k);
    let driver = ReportDriver::new(&agent, &pipeline.config.report);

    let mut stream = driver.process(vcf)?;
    let mut first_error: Option<AppError> = None;
    for item in stream.by_ref() {
        let (record, report) = match item {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("error: {e}");
                first_error.get_or_insert(e);
                continue;
            }
        };
        let query = render_variant_text(&record);
        match format {
            OutputFormat::Json => {
                let evidence: Vec<EvidenceLine> = report
                    .evidence
                    .iter()
                    .map(|h| EvidenceLine {
                        rank: h.rank,
                        entry_id: &h.entry_id,
                        score: h.score,
                        pmid: h.metadata.get(META_PMID).map(String::as_str),
                    })
                    .collect();
                print_json(&serde_json::json!({
                    "variant": record,
                    "query": query,
                    "report": report.text,
                    "evidence": evidence,
                    "grounding": report.grounding,
                }))?;
            }
            OutputFormat::Plain => {
                println!("Analyzing: {query}");
                println!("Report:\n{}", report.text.trim_end());
                println!("{RULE}");
            }
        }
    }

    let stats = stream.stats();
    tracing::info!(
        records = stats.records_read,
        skipped_low_quality = stats.skipped_low_quality,
        reported = stats.reported,
        failed = stats.failed,
        "variant file processed"
    );

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

pub fn ask(pipeline: &Pipeline, question: &str, format: &OutputFormat) -> Result<(), AppError> {
    let store = pipeline.store();
    let llm = pipeline.llm()?;
    let agent = RagAgent::new(
        &store,
        pipeline.embedder(),
        &llm,
        pipeline.config.ollama.generation_model.clone(),
    )
    .with_top_k(pipeline.config.retrieval.top_k);

    let report = agent.answer_with_evidence(question)?;
    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Plain => {
            println!("{}", report.text.trim_end());
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct HealthStatus {
    ok: bool,
    message: String,
    store_ready: bool,
    store_entries: u64,
    store_model: Option<String>,
}

pub fn health(pipeline: &Pipeline, format: &OutputFormat) -> Result<(), AppError> {
    let client = pipeline.ollama_client()?;
    client.health_check()?;
    let status = pipeline.store().status()?;

    let health = HealthStatus {
        ok: true,
        message: format!("Ollama reachable at {}", client.base_url()),
        store_ready: status.ready,
        store_entries: status.entry_count,
        store_model: status.model,
    };
    match format {
        OutputFormat::Json => print_json(&health),
        OutputFormat::Plain => {
            println!("{}", health.message);
            println!(
                "store: {} ({} entries)",
                if health.store_ready { "ready" } else { "empty" },
                health.store_entries
            );
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", json_line(value)?);
    Ok(())
}

fn json_line<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|e| {
        AppError::new(codes::OUTPUT_FAILED, "Failed to encode JSON output")
            .with_details(e.to_string())
    })
}
