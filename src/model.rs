use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

/// One pivoted forecast: a single (model, forecast_date, target_end_date)
/// with the interval's median / lower / upper predictions and the observed
/// case count joined by target date, if one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    pub model: String,
    pub forecast_date: NaiveDate,
    pub target_end_date: NaiveDate,
    pub median: f64,
    pub lower: f64,
    pub upper: f64,
    pub true_value: Option<f64>,
}

/// Why a (forecast_date, model) group was excluded from a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionKind {
    MissingObservation,
    InsufficientHistory,
    EmptyModelGroup,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionCounts {
    pub missing_observation: usize,
    pub insufficient_history: usize,
    pub empty_model_group: usize,
}

impl ExclusionCounts {
    pub fn record(&mut self, kind: ExclusionKind) {
        match kind {
            ExclusionKind::MissingObservation => self.missing_observation += 1,
            ExclusionKind::InsufficientHistory => self.insufficient_history += 1,
            ExclusionKind::EmptyModelGroup => self.empty_model_group += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.missing_observation + self.insufficient_history + self.empty_model_group
    }
}

/// Per-model summary rate over the groups that survived exclusion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRate {
    pub groups_used: usize,
    pub outcomes_true: usize,
    pub rate: f64,
}

impl ModelRate {
    /// Whole-percent rendering, e.g. 1/3 -> "33%".
    pub fn percent(&self) -> String {
        format!("{:.0}%", self.rate * 100.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryOutcome {
    pub rates: BTreeMap<String, ModelRate>,
    pub exclusions: ExclusionCounts,
}

/// A malformed or rejected input row, reported rather than aborting the load.
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    pub file: String,
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadStats {
    pub forecast_files: usize,
    pub rows_read: usize,
    pub rows_used: usize,
    pub rows_skipped_ci_level: usize,
    pub observations_loaded: usize,
    pub join_misses: usize,
    pub filtered_out_of_range: usize,
    pub row_errors: Vec<RowError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputFileEntry {
    pub path: String,
    pub sha256: String,
}

/// Archived output of `episcore report`: both summaries plus enough
/// provenance to reproduce them.
#[derive(Debug, Clone, Serialize)]
pub struct ReportManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub command: String,
    pub ci_level: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub inputs: Vec<InputFileEntry>,
    pub load_stats: LoadStats,
    pub overprediction: SummaryOutcome,
    pub direction: SummaryOutcome,
}
