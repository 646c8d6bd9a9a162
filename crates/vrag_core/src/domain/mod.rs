use serde::{Deserialize, Serialize};

/// One data line of a variant call file.
///
/// Notes:
/// - `pos` is the 1-based VCF coordinate, kept as written.
/// - `alternates` keeps VCF order; a missing ALT (`.`) is an empty list.
/// - `quality` is `None` when QUAL is `.` or the column is absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantRecord {
    pub chrom: String,
    pub pos: u64,
    pub id: Option<String>,
    pub reference: String,
    pub alternates: Vec<String>,
    pub quality: Option<f64>,
    /// Line number in the source file, for diagnostics.
    pub line: u64,
}

impl VariantRecord {
    pub fn first_alternate(&self) -> Option<&str> {
        self.alternates.first().map(String::as_str)
    }

    pub fn is_multiallelic(&self) -> bool {
        self.alternates.len() > 1
    }
}
