//! Congestion resolution.
//!
//! The report-type code doubles as the congestion score, but a large share of rows
//! carry a generic "info" code instead. This stage keeps genuine scores, repairs
//! free-text status reports from the speed quoted in their comment, and drops
//! everything else with a reason.

pub mod kind;
pub mod speed;

pub use kind::ReportKind;
pub use speed::{SpeedBreakpoints, extract_speed};

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::normalize::{NormalizedReport, RoadId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Ordinal congestion score, 1 (free-flowing) to 5 (gridlock).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Congestion(u8);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("congestion code {0} is outside 1..=5")]
pub struct InvalidCongestion(pub u16);

impl Congestion {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl TryFrom<u16> for Congestion {
    type Error = InvalidCongestion;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        if (u16::from(Self::MIN)..=u16::from(Self::MAX)).contains(&code) {
            Ok(Self(code as u8))
        } else {
            Err(InvalidCongestion(code))
        }
    }
}

impl TryFrom<u8> for Congestion {
    type Error = InvalidCongestion;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::try_from(u16::from(code))
    }
}

impl From<Congestion> for u8 {
    fn from(c: Congestion) -> u8 {
        c.0
    }
}

/// A genuine congestion report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedReport {
    pub road_id: RoadId,
    pub comment_id: String,
    pub report_time: DateTime<Utc>,
    pub congestion: Congestion,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    pub scored: usize,
    pub recovered_from_speed: usize,
    pub questions: usize,
    pub incidents: usize,
    pub unknown_codes: usize,
    pub dropped_unresolved: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub reports: Vec<ResolvedReport>,
    pub stats: ResolveStats,
}

/// Resolves one report. Scores already in range pass through untouched; the speed
/// remap only applies to free-text status reports.
pub fn resolve_report(
    report: &NormalizedReport,
    config: &ResolverConfig,
    breakpoints: &SpeedBreakpoints,
) -> Result<(ResolvedReport, ReportKind), ResolveError> {
    let kind = ReportKind::classify(report.report_code, config);
    let congestion = match kind {
        ReportKind::Congestion(level) => level,
        ReportKind::FreeTextStatus => report
            .comment_text
            .as_deref()
            .and_then(extract_speed)
            .map(|speed| breakpoints.congestion(speed))
            .ok_or_else(|| ResolveError::UnresolvedCongestion {
                comment_id: report.comment_id.clone(),
            })?,
        ReportKind::Question => return Err(ResolveError::Question),
        ReportKind::Incident => return Err(ResolveError::Incident(report.report_code)),
        ReportKind::Unknown => return Err(ResolveError::UnknownCode(report.report_code)),
    };

    Ok((
        ResolvedReport {
            road_id: report.road_id,
            comment_id: report.comment_id.clone(),
            report_time: report.report_time,
            congestion,
        },
        kind,
    ))
}

/// Runs the resolution stage, counting every row that does not make it through.
#[tracing::instrument(skip_all, fields(reports = reports.len()))]
pub fn resolve(reports: &[NormalizedReport], config: &ResolverConfig) -> Resolved {
    let breakpoints = SpeedBreakpoints::new(config.speed_breakpoints);
    let mut stats = ResolveStats::default();
    let mut resolved = Vec::with_capacity(reports.len());

    for report in reports {
        match resolve_report(report, config, &breakpoints) {
            Ok((r, ReportKind::FreeTextStatus)) => {
                stats.recovered_from_speed += 1;
                resolved.push(r);
            }
            Ok((r, _)) => {
                stats.scored += 1;
                resolved.push(r);
            }
            Err(ResolveError::Question) => stats.questions += 1,
            Err(ResolveError::Incident(_)) => stats.incidents += 1,
            Err(ResolveError::UnknownCode(code)) => {
                stats.unknown_codes += 1;
                debug!(code, comment_id = %report.comment_id, "Unknown report code");
            }
            Err(e @ ResolveError::UnresolvedCongestion { .. }) => {
                stats.dropped_unresolved += 1;
                debug!(error = %e, "Dropping unresolved report");
            }
        }
    }

    if stats.dropped_unresolved > 0 {
        warn!(
            dropped = stats.dropped_unresolved,
            recovered = stats.recovered_from_speed,
            "Free-text status reports without a usable speed were dropped"
        );
    }
    debug!(?stats, "Resolution complete");

    Resolved {
        reports: resolved,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(code: u16, text: Option<&str>) -> NormalizedReport {
        NormalizedReport {
            road_id: 1,
            report_code: code,
            comment_id: format!("c{code}"),
            comment_text: text.map(str::to_string),
            report_time: Utc.with_ymd_and_hms(2016, 1, 25, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_congestion_rejects_out_of_range() {
        assert!(Congestion::try_from(0u8).is_err());
        assert!(Congestion::try_from(6u8).is_err());
        assert_eq!(Congestion::try_from(3u8).unwrap().value(), 3);
    }

    #[test]
    fn test_scores_pass_through_even_with_speed_comment() {
        let config = ResolverConfig::default();
        let bp = SpeedBreakpoints::default();
        let (r, kind) = resolve_report(&report(4, Some("90 km/h")), &config, &bp).unwrap();
        assert_eq!(r.congestion.value(), 4);
        assert!(matches!(kind, ReportKind::Congestion(_)));
    }

    #[test]
    fn test_free_text_status_recovered_from_speed() {
        let config = ResolverConfig::default();
        let bp = SpeedBreakpoints::default();
        let (r, kind) = resolve_report(&report(10, Some("السرعة 15 كم/س")), &config, &bp).unwrap();
        assert_eq!(r.congestion.value(), 4);
        assert_eq!(kind, ReportKind::FreeTextStatus);
    }

    #[test]
    fn test_resolve_counts_every_outcome() {
        let config = ResolverConfig::default();
        let reports = vec![
            report(1, None),
            report(5, Some("zahma")),
            report(10, Some("85 km/h")),
            report(10, Some("no idea")),
            report(10, None),
            report(6, Some("what's up?")),
            report(8, Some("accident")),
            report(99, None),
        ];
        let out = resolve(&reports, &config);
        assert_eq!(out.reports.len(), 3);
        assert_eq!(
            out.stats,
            ResolveStats {
                scored: 2,
                recovered_from_speed: 1,
                questions: 1,
                incidents: 1,
                unknown_codes: 1,
                dropped_unresolved: 2,
            }
        );
        assert_eq!(out.reports[2].congestion.value(), 1);
        assert!(out.reports.iter().all(|r| (1..=5).contains(&r.congestion.value())));
    }
}
