//! The canonical congestion time series.
//!
//! Assembled once from resolved reports, then only read. Downstream stages derive
//! new views ([`CongestionSeries::restrict`]) rather than mutating it.

use crate::config::WindowSection;
use crate::error::{PipelineError, Result};
use crate::resolve::ResolvedReport;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(PipelineError::InvalidInput(format!(
                "window start {start} is not before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    /// Contiguous left-closed buckets covering the window. The last bucket is cut
    /// short at `end` when the window is not a whole number of buckets.
    pub fn buckets(&self, width: TimeDelta) -> Result<Vec<DateTime<Utc>>> {
        check_width(width)?;
        let mut starts = Vec::new();
        let mut t = self.start;
        while t < self.end {
            starts.push(t);
            match t.checked_add_signed(width) {
                Some(next) => t = next,
                None => break,
            }
        }
        Ok(starts)
    }
}

/// Bucket widths are whole seconds, at least one. Indexing divides by
/// `num_seconds`, so a fractional part would put starts and indexes out of step.
fn check_width(width: TimeDelta) -> Result<()> {
    if width.num_seconds() < 1 || width.subsec_nanos() != 0 {
        return Err(PipelineError::InvalidInput(format!(
            "bucket width {width} must be a whole number of seconds, at least one"
        )));
    }
    Ok(())
}

/// Index of the bucket of `width` starting at `origin` that contains `t`.
pub fn bucket_index(t: DateTime<Utc>, origin: DateTime<Utc>, width: TimeDelta) -> i64 {
    (t - origin).num_seconds().div_euclid(width.num_seconds())
}

/// Number of reports in one bucket of the full series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DensityRow {
    pub bucket_start: DateTime<Utc>,
    pub reports: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CongestionSeries {
    reports: Vec<ResolvedReport>,
}

impl CongestionSeries {
    /// Sorts by `(report_time, road_id, comment_id, congestion)` and drops rows equal
    /// in every field. Returns the series and the number of rows dropped.
    pub fn from_reports(mut reports: Vec<ResolvedReport>) -> (Self, usize) {
        reports.sort_by(|a, b| {
            (a.report_time, a.road_id, &a.comment_id, a.congestion).cmp(&(
                b.report_time,
                b.road_id,
                &b.comment_id,
                b.congestion,
            ))
        });
        let before = reports.len();
        let mut seen = HashSet::with_capacity(reports.len());
        reports.retain(|r| seen.insert(r.clone()));
        let dropped = before - reports.len();
        (Self { reports }, dropped)
    }

    pub fn reports(&self) -> &[ResolvedReport] {
        &self.reports
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedReport> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Earliest and latest report time.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.reports.first()?.report_time, self.reports.last()?.report_time))
    }

    /// A new series holding only the reports inside `window`.
    pub fn restrict(&self, window: &TimeWindow) -> CongestionSeries {
        CongestionSeries {
            reports: self
                .reports
                .iter()
                .filter(|r| window.contains(r.report_time))
                .cloned()
                .collect(),
        }
    }

    /// Report counts per bucket over the whole series, buckets aligned to the Unix
    /// epoch. Empty buckets between the first and last report are included, which is
    /// what a caller needs to spot crawler outages when choosing a reliable window.
    pub fn density(&self, width: TimeDelta) -> Result<Vec<DensityRow>> {
        check_width(width)?;
        let Some((first, last)) = self.span() else {
            return Ok(Vec::new());
        };
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let first_idx = bucket_index(first, epoch, width);
        let last_idx = bucket_index(last, epoch, width);

        let mut counts = vec![0usize; (last_idx - first_idx + 1) as usize];
        for r in &self.reports {
            counts[(bucket_index(r.report_time, epoch, width) - first_idx) as usize] += 1;
        }

        Ok(counts
            .into_iter()
            .enumerate()
            .map(|(i, reports)| DensityRow {
                bucket_start: epoch
                    + TimeDelta::seconds(width.num_seconds() * (first_idx + i as i64)),
                reports,
            })
            .collect())
    }
}

/// Counts from assembling the series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssembleStats {
    pub outside_window: usize,
    pub duplicates: usize,
}

/// Builds the canonical series from resolved reports, keeping only those inside the
/// (possibly open-ended) reliable window.
#[tracing::instrument(skip_all, fields(reports = resolved.len()))]
pub fn assemble(
    resolved: Vec<ResolvedReport>,
    window: &WindowSection,
) -> (CongestionSeries, AssembleStats) {
    let before = resolved.len();
    let inside: Vec<ResolvedReport> = resolved
        .into_iter()
        .filter(|r| window.start.is_none_or(|s| r.report_time >= s))
        .filter(|r| window.end.is_none_or(|e| r.report_time < e))
        .collect();
    let outside_window = before - inside.len();

    let (series, duplicates) = CongestionSeries::from_reports(inside);
    debug!(
        rows = series.len(),
        outside_window, duplicates, "Series assembled"
    );
    (
        series,
        AssembleStats {
            outside_window,
            duplicates,
        },
    )
}
