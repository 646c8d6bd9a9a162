//! Variant file to clinical reports.
//!
//! `ReportStream` is lazy and single pass: each `next()` reads records until one
//! passes the quality filter, then asks the agent about it.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use vrag_core::config::{ErrorPolicy, ReportConfig};
use vrag_core::domain::VariantRecord;
use vrag_core::error::AppError;
use vrag_core::vcf::VcfReader;

use crate::agent::{ClinicalReport, RagAgent};

/// Multi-allelic sites only describe the first alternate.
pub fn render_variant_text(record: &VariantRecord) -> String {
    format!(
        "Variant on Chromosome {} at position {}. Ref: {}, Alt: {}.",
        record.chrom,
        record.pos,
        record.reference,
        record.first_alternate().unwrap_or(".")
    )
}

/// QUAL must be present and strictly above `min_quality`.
pub fn passes_quality(record: &VariantRecord, min_quality: f64) -> bool {
    matches!(record.quality, Some(q) if q > min_quality)
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct DriverStats {
    pub records_read: u64,
    pub skipped_low_quality: u64,
    pub reported: u64,
    pub failed: u64,
}

pub struct ReportDriver<'a> {
    agent: &'a RagAgent<'a>,
    min_quality: f64,
    on_error: ErrorPolicy,
}

impl<'a> ReportDriver<'a> {
    pub fn new(agent: &'a RagAgent<'a>, cfg: &ReportConfig) -> Self {
        Self {
            agent,
            min_quality: cfg.min_quality,
            on_error: cfg.on_error,
        }
    }

    pub fn process(&self, path: &Path) -> Result<ReportStream<'a, File>, AppError> {
        tracing::info!(path = %path.display(), min_quality = self.min_quality, "reading variant file");
        Ok(self.stream(VcfReader::open(path)?))
    }

    pub fn process_reader<R: Read>(&self, reader: R) -> ReportStream<'a, R> {
        self.stream(VcfReader::from_reader(reader))
    }

    fn stream<R: Read>(&self, records: VcfReader<R>) -> ReportStream<'a, R> {
        ReportStream {
            agent: self.agent,
            records,
            min_quality: self.min_quality,
            on_error: self.on_error,
            halted: false,
            stats: DriverStats::default(),
        }
    }
}

pub struct ReportStream<'a, R: Read> {
    agent: &'a RagAgent<'a>,
    records: VcfReader<R>,
    min_quality: f64,
    on_error: ErrorPolicy,
    halted: bool,
    stats: DriverStats,
}

impl<R: Read> ReportStream<'_, R> {
    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    fn fail(&mut self, e: AppError) -> Option<Result<(VariantRecord, ClinicalReport), AppError>> {
        self.stats.failed += 1;
        if self.on_error == ErrorPolicy::Abort {
            self.halted = true;
            tracing::error!(error = %e, "variant processing aborted");
        } else {
            tracing::warn!(error = %e, "variant failed; continuing");
        }
        Some(Err(e))
    }
}

impl<R: Read> Iterator for ReportStream<'_, R> {
    type Item = Result<(VariantRecord, ClinicalReport), AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }
        loop {
            let record = match self.records.next()? {
                Ok(r) => r,
                Err(e) => return self.fail(e),
            };
            self.stats.records_read += 1;

            if !passes_quality(&record, self.min_quality) {
                self.stats.skipped_low_quality += 1;
                tracing::debug!(
                    chrom = %record.chrom,
                    pos = record.pos,
                    quality = ?record.quality,
                    "below quality threshold; skipped"
                );
                continue;
            }

            let text = render_variant_text(&record);
            return match self.agent.answer_with_evidence(&text) {
                Ok(report) => {
                    self.stats.reported += 1;
                    Some(Ok((record, report)))
                }
                Err(e) => {
                    let e = if e.details.is_none() {
                        e.with_details(format!("line={}", record.line))
                    } else {
                        e
                    };
                    self.fail(e)
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(alternates: &[&str], quality: Option<f64>) -> VariantRecord {
        VariantRecord {
            chrom: "17".to_string(),
            pos: 41276045,
            id: None,
            reference: "G".to_string(),
            alternates: alternates.iter().map(|s| s.to_string()).collect(),
            quality,
            line: 1,
        }
    }

    #[test]
    fn renders_first_alternate_only() {
        assert_eq!(
            render_variant_text(&record(&["A"], Some(75.0))),
            "Variant on Chromosome 17 at position 41276045. Ref: G, Alt: A."
        );
        assert_eq!(
            render_variant_text(&record(&["T", "A"], Some(75.0))),
            "Variant on Chromosome 17 at position 41276045. Ref: G, Alt: T."
        );
        assert_eq!(
            render_variant_text(&record(&[], Some(75.0))),
            "Variant on Chromosome 17 at position 41276045. Ref: G, Alt: .."
        );
    }

    #[test]
    fn quality_threshold_is_strict_and_requires_a_value() {
        assert!(passes_quality(&record(&["A"], Some(50.1)), 50.0));
        assert!(!passes_quality(&record(&["A"], Some(50.0)), 50.0));
        assert!(!passes_quality(&record(&["A"], None), 50.0));
    }
}
