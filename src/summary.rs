//! Per-run audit counters.
//!
//! Every row that enters the pipeline is accounted for: it either reaches the series
//! or is counted against the stage that dropped it.

use crate::normalize::NormalizeStats;
use crate::resolve::ResolveStats;
use crate::series::AssembleStats;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub raw_rows: usize,

    // normalization
    pub dropped_decode: usize,
    pub exact_duplicates: usize,
    pub near_duplicates: usize,
    pub roads: usize,

    // resolution
    pub scored: usize,
    pub recovered_from_speed: usize,
    pub questions: usize,
    pub incidents: usize,
    pub unknown_codes: usize,
    pub dropped_unresolved: usize,

    // assembly
    pub outside_window: usize,
    pub series_duplicates: usize,
    pub series_rows: usize,
}

impl RunSummary {
    pub fn from_stages(
        normalize: &NormalizeStats,
        roads: usize,
        resolve: &ResolveStats,
        assemble: &AssembleStats,
        series_rows: usize,
    ) -> Self {
        RunSummary {
            raw_rows: normalize.raw_rows,
            dropped_decode: normalize.dropped_decode,
            exact_duplicates: normalize.exact_duplicates,
            near_duplicates: normalize.near_duplicates,
            roads,
            scored: resolve.scored,
            recovered_from_speed: resolve.recovered_from_speed,
            questions: resolve.questions,
            incidents: resolve.incidents,
            unknown_codes: resolve.unknown_codes,
            dropped_unresolved: resolve.dropped_unresolved,
            outside_window: assemble.outside_window,
            series_duplicates: assemble.duplicates,
            series_rows,
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Rows removed for any reason.
    pub fn dropped_total(&self) -> usize {
        self.dropped_decode
            + self.exact_duplicates
            + self.near_duplicates
            + self.questions
            + self.incidents
            + self.unknown_codes
            + self.dropped_unresolved
            + self.outside_window
            + self.series_duplicates
    }

    /// True when every raw row is either in the series or counted as dropped.
    pub fn is_balanced(&self) -> bool {
        self.raw_rows == self.series_rows + self.dropped_total()
    }

    pub fn log(&self) {
        info!(
            raw_rows = self.raw_rows,
            dropped_decode = self.dropped_decode,
            decode_pct = Self::pct(self.dropped_decode, self.raw_rows),
            exact_duplicates = self.exact_duplicates,
            near_duplicates = self.near_duplicates,
            roads = self.roads,
            "Normalization summary"
        );
        info!(
            scored = self.scored,
            recovered_from_speed = self.recovered_from_speed,
            questions = self.questions,
            incidents = self.incidents,
            unknown_codes = self.unknown_codes,
            dropped_unresolved = self.dropped_unresolved,
            "Resolution summary"
        );
        info!(
            outside_window = self.outside_window,
            series_duplicates = self.series_duplicates,
            series_rows = self.series_rows,
            balanced = self.is_balanced(),
            "Series summary"
        );
    }
}
