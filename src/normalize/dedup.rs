//! Collapsing re-observations of the same physical report.
//!
//! A report stays in the feed for as long as its age is inside the display window, so
//! every crawl re-emits it. Once crawl-only fields are stripped those copies are either
//! identical or differ by a minute of rounding jitter in `report_time`.

use crate::normalize::{NormalizedReport, RoadId};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{HashMap, HashSet};

/// Largest `report_time` difference, in minutes, still treated as the same event.
pub const NEAR_DUPLICATE_TOLERANCE_MINUTES: i64 = 1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deduplicated {
    pub reports: Vec<NormalizedReport>,
    pub exact_duplicates: usize,
    pub near_duplicates: usize,
}

/// Every field except `report_time`.
#[derive(Hash, PartialEq, Eq)]
struct NearKey<'a> {
    road_id: RoadId,
    report_code: u16,
    comment_id: &'a str,
    comment_text: Option<&'a str>,
}

impl<'a> NearKey<'a> {
    fn of(report: &'a NormalizedReport) -> Self {
        Self {
            road_id: report.road_id,
            report_code: report.report_code,
            comment_id: &report.comment_id,
            comment_text: report.comment_text.as_deref(),
        }
    }
}

/// Drops rows equal in every field, keeping first occurrences in input order.
pub fn dedup_exact(reports: Vec<NormalizedReport>) -> (Vec<NormalizedReport>, usize) {
    let mut seen = HashSet::with_capacity(reports.len());
    let before = reports.len();
    let kept: Vec<_> = reports
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Drops rows whose `report_time` lies within [`NEAR_DUPLICATE_TOLERANCE_MINUTES`] of an
/// already-kept row with the same [`NearKey`].
///
/// Within a key, times are visited in ascending order and compared against the last
/// kept time, so kept rows are always more than the tolerance apart. That makes the
/// operation idempotent. Survivors keep their input order.
pub fn dedup_near(reports: Vec<NormalizedReport>) -> (Vec<NormalizedReport>, usize) {
    let mut groups: HashMap<NearKey<'_>, Vec<(DateTime<Utc>, usize)>> = HashMap::new();
    for (idx, report) in reports.iter().enumerate() {
        groups
            .entry(NearKey::of(report))
            .or_default()
            .push((report.report_time, idx));
    }

    let tolerance = TimeDelta::minutes(NEAR_DUPLICATE_TOLERANCE_MINUTES);
    let mut keep = vec![true; reports.len()];
    for mut times in groups.into_values() {
        if times.len() < 2 {
            continue;
        }
        times.sort();
        let mut last_kept = times[0].0;
        for &(t, idx) in &times[1..] {
            if t - last_kept <= tolerance {
                keep[idx] = false;
            } else {
                last_kept = t;
            }
        }
    }

    let before = reports.len();
    let kept: Vec<_> = reports
        .into_iter()
        .zip(keep)
        .filter_map(|(r, k)| k.then_some(r))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Exact collapse followed by near-duplicate collapse.
pub fn deduplicate(reports: Vec<NormalizedReport>) -> Deduplicated {
    let (reports, exact_duplicates) = dedup_exact(reports);
    let (reports, near_duplicates) = dedup_near(reports);
    Deduplicated {
        reports,
        exact_duplicates,
        near_duplicates,
    }
}
