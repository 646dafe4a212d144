//! # gitsnap-stats
//!
//! Per-language counters for stats mode and their JSON serialization.
//!
//! The document shape (`countersByLanguage`, `totalFileCount`,
//! `snapshotSizeInMb`) is consumed by an external complexity tool; the field
//! names are part of that contract.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use gitsnap_loc::Language;
use serde::Serialize;

/// Statistics for a single language bucket.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LanguageCounters {
    pub number_of_files: u64,
    pub lines_of_code: f64,
}

/// The stats document accumulated over one run.
///
/// An entry contributes to at most one language bucket;
/// `total_file_count` equals the sum of `number_of_files` across buckets.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeStats {
    pub counters_by_language: BTreeMap<&'static str, LanguageCounters>,
    pub total_file_count: u64,
    pub snapshot_size_in_mb: u64,
    #[serde(skip)]
    total_size_bytes: u64,
}

impl CodeStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one counted file.
    pub fn add_file(&mut self, language: Language, lines_of_code: u64, size_bytes: u64) {
        self.total_file_count += 1;
        self.total_size_bytes += size_bytes;

        let counters = self
            .counters_by_language
            .entry(language.as_str())
            .or_default();
        counters.number_of_files += 1;
        counters.lines_of_code += lines_of_code as f64;
    }

    /// Compute the derived fields from the accumulated totals.
    pub fn finalize(&mut self) {
        let megabytes = self.total_size_bytes as f64 / (1024.0 * 1024.0);
        self.snapshot_size_in_mb = megabytes.round() as u64;
    }

    /// The pretty-printed JSON document (2-space indent).
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
