//! End-to-end reconstruction: raw rows to the canonical congestion series.
//!
//! Each stage is a function of the previous stage's output; nothing is shared or
//! mutated between them.

use crate::config::PipelineConfig;
use crate::error::{ParseError, Result};
use crate::ingest::RawRecord;
use crate::normalize::{RoadIdentity, normalize};
use crate::resolve::resolve;
use crate::series::{CongestionSeries, assemble};
use crate::summary::RunSummary;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub series: CongestionSeries,
    pub roads: RoadIdentity,
    pub summary: RunSummary,
}

/// Runs normalization, resolution and assembly over a batch of raw rows.
///
/// # Errors
///
/// Fails only on structural problems: an invalid config or a road identity conflict.
/// Row-level problems are counted in the returned [`RunSummary`].
#[tracing::instrument(skip_all)]
pub fn run<I>(records: I, config: &PipelineConfig) -> Result<PipelineOutput>
where
    I: IntoIterator<Item = Result<RawRecord, ParseError>>,
{
    config.validate()?;

    let normalized = normalize(records)?;
    if normalized.roads.is_empty() {
        warn!(
            raw_rows = normalized.stats.raw_rows,
            "No road could be decoded; the series will be empty"
        );
    }
    let resolved = resolve(&normalized.reports, &config.resolver);
    let (series, assemble_stats) = assemble(resolved.reports, &config.window);

    let summary = RunSummary::from_stages(
        &normalized.stats,
        normalized.roads.len(),
        &resolved.stats,
        &assemble_stats,
        series.len(),
    );
    info!(
        series_rows = summary.series_rows,
        dropped = summary.dropped_total(),
        "Pipeline finished"
    );

    Ok(PipelineOutput {
        series,
        roads: normalized.roads,
        summary,
    })
}
