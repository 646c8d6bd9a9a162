//! Streaming reader for tab-separated variant call files.
//!
//! Only the fixed leading columns are interpreted (`CHROM POS ID REF ALT QUAL`);
//! everything after QUAL is ignored. Header lines (`##...` and `#CHROM...`) are
//! skipped as comments.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::VariantRecord;
use crate::error::{codes, AppError};

const COL_CHROM: usize = 0;
const COL_POS: usize = 1;
const COL_ID: usize = 2;
const COL_REF: usize = 3;
const COL_ALT: usize = 4;
const COL_QUAL: usize = 5;

const MISSING: &str = ".";

/// Lazy, single-pass iterator over the records of a VCF stream.
pub struct VcfReader<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
}

impl VcfReader<File> {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path).map_err(|e| {
            AppError::new(codes::VCF_READ_FAILED, "Failed to open variant file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> VcfReader<R> {
    pub fn from_reader(reader: R) -> Self {
        let records = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .quoting(false)
            .from_reader(reader)
            .into_records();
        Self { records }
    }
}

impl<R: Read> Iterator for VcfReader<R> {
    type Item = Result<VariantRecord, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.records.next()? {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                return Some(Err(AppError::new(
                    codes::VCF_PARSE_FAILED,
                    "Failed to read variant record",
                )
                .with_details(format!("line={line}; err={e}"))));
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        Some(parse_record(&row, line))
    }
}

fn parse_record(row: &csv::StringRecord, line: u64) -> Result<VariantRecord, AppError> {
    if row.len() <= COL_ALT {
        return Err(parse_error(line, "Variant record has too few columns")
            .with_details(format!("line={line}; columns={}", row.len())));
    }

    let field = |idx: usize| row.get(idx).map(str::trim).unwrap_or("");

    let chrom = field(COL_CHROM);
    if chrom.is_empty() {
        return Err(parse_error(line, "Variant record is missing CHROM"));
    }

    let pos_raw = field(COL_POS);
    let pos = pos_raw.parse::<u64>().map_err(|_| {
        parse_error(line, "Variant position is not a non-negative integer")
            .with_details(format!("line={line}; pos={pos_raw}"))
    })?;

    let reference = field(COL_REF);
    if reference.is_empty() {
        return Err(parse_error(line, "Variant record is missing REF"));
    }

    let id = match field(COL_ID) {
        "" | MISSING => None,
        s => Some(s.to_string()),
    };

    let alternates = match field(COL_ALT) {
        "" | MISSING => Vec::new(),
        s => s.split(',').map(|a| a.trim().to_string()).collect(),
    };

    let quality = match row.get(COL_QUAL).map(str::trim) {
        None | Some("") | Some(MISSING) => None,
        Some(s) => Some(s.parse::<f64>().map_err(|_| {
            parse_error(line, "Variant quality is not a number")
                .with_details(format!("line={line}; qual={s}"))
        })?),
    };

    Ok(VariantRecord {
        chrom: chrom.to_string(),
        pos,
        id,
        reference: reference.to_string(),
        alternates,
        quality,
        line,
    })
}

fn parse_error(line: u64, message: &str) -> AppError {
    AppError::new(codes::VCF_PARSE_FAILED, message).with_details(format!("line={line}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fixed_columns_and_skips_headers() {
        let vcf = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n17\t41276045\trs80357906\tG\tA\t75\tPASS\tDP=30\n";
        let records: Vec<_> = VcfReader::from_reader(vcf.as_bytes())
            .collect::<Result<_, _>>()
            .expect("parse");
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.chrom, "17");
        assert_eq!(r.pos, 41276045);
        assert_eq!(r.id.as_deref(), Some("rs80357906"));
        assert_eq!(r.reference, "G");
        assert_eq!(r.alternates, vec!["A".to_string()]);
        assert_eq!(r.quality, Some(75.0));
        assert!(r.line >= 1);
    }

    #[test]
    fn missing_values_become_none() {
        let vcf = "1\t100\t.\tC\t.\t.\n";
        let r = VcfReader::from_reader(vcf.as_bytes())
            .next()
            .expect("one record")
            .expect("parse");
        assert_eq!(r.id, None);
        assert!(r.alternates.is_empty());
        assert_eq!(r.quality, None);
    }

    #[test]
    fn bad_position_is_a_parse_error() {
        let vcf = "1\tabc\t.\tC\tT\t60\n";
        let err = VcfReader::from_reader(vcf.as_bytes())
            .next()
            .expect("one item")
            .expect_err("should fail");
        assert_eq!(err.code, codes::VCF_PARSE_FAILED);
    }
}
