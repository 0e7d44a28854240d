//! Two-sample tests between hourly cells.
//!
//! Both families use Welch's unequal-variance t-test and only evaluate cells where
//! each side reaches the configured minimum sample size. Cells below that size are
//! left out of the result table entirely.

use crate::analysis::distribution::t_two_sided_p;
use crate::analysis::types::{GroupKey, HypothesisResult, TestFamily};
use crate::analysis::utility::{mean, sample_variance};
use crate::analysis::{as_f64, group_by_cell};
use crate::config::{CalendarConfig, InferenceConfig};
use crate::error::{PipelineError, Result};
use crate::normalize::RoadId;
use crate::resolve::Congestion;
use crate::series::CongestionSeries;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchOutcome {
    pub mean_a: f64,
    pub mean_b: f64,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
}

/// Welch's two-sample t-test. `None` when either side has fewer than two values.
///
/// When both samples have zero variance the statistic is degenerate: the p-value is
/// 1 for equal means and 0 otherwise.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<WelchOutcome> {
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let mean_a = mean(a);
    let mean_b = mean(b);
    let sa = sample_variance(a, mean_a)? / na;
    let sb = sample_variance(b, mean_b)? / nb;
    let se2 = sa + sb;

    if se2 == 0.0 {
        let (t_statistic, p_value) = if mean_a == mean_b {
            (0.0, 1.0)
        } else {
            ((mean_a - mean_b).signum() * f64::INFINITY, 0.0)
        };
        return Some(WelchOutcome {
            mean_a,
            mean_b,
            t_statistic,
            degrees_of_freedom: na + nb - 2.0,
            p_value,
        });
    }

    let t_statistic = (mean_a - mean_b) / se2.sqrt();
    let degrees_of_freedom = se2 * se2 / (sa * sa / (na - 1.0) + sb * sb / (nb - 1.0));
    Some(WelchOutcome {
        mean_a,
        mean_b,
        t_statistic,
        degrees_of_freedom,
        p_value: t_two_sided_p(t_statistic, degrees_of_freedom),
    })
}

struct Cell<'a> {
    road_id: RoadId,
    paired_road_id: Option<RoadId>,
    is_weekend: Option<bool>,
    hour_of_day: u32,
    a: &'a [Congestion],
    b: &'a [Congestion],
}

fn evaluate(family: TestFamily, cells: Vec<Cell<'_>>, config: &InferenceConfig) -> Vec<HypothesisResult> {
    cells
        .par_iter()
        .filter(|c| c.a.len() >= config.min_sample_size && c.b.len() >= config.min_sample_size)
        .filter_map(|c| {
            let outcome = welch_t_test(&as_f64(c.a), &as_f64(c.b))?;
            Some(HypothesisResult {
                family,
                road_id: c.road_id,
                paired_road_id: c.paired_road_id,
                is_weekend: c.is_weekend,
                hour_of_day: c.hour_of_day,
                sample_size_a: c.a.len(),
                sample_size_b: c.b.len(),
                mean_a: outcome.mean_a,
                mean_b: outcome.mean_b,
                t_statistic: outcome.t_statistic,
                degrees_of_freedom: outcome.degrees_of_freedom,
                p_value: outcome.p_value,
                reject_null: outcome.p_value < config.alpha,
            })
        })
        .collect()
}

/// Weekday against weekend congestion for each road and hour.
#[tracing::instrument(skip_all, fields(reports = series.len()))]
pub fn weekday_vs_weekend(
    series: &CongestionSeries,
    calendar: &CalendarConfig,
    config: &InferenceConfig,
) -> Vec<HypothesisResult> {
    let groups = group_by_cell(series, calendar);

    let cells: Vec<Cell<'_>> = groups
        .iter()
        .filter(|(key, _)| !key.is_weekend)
        .filter_map(|(key, weekday)| {
            let weekend = groups.get(&GroupKey {
                is_weekend: true,
                ..*key
            })?;
            Some(Cell {
                road_id: key.road_id,
                paired_road_id: None,
                is_weekend: None,
                hour_of_day: key.hour_of_day,
                a: weekday,
                b: weekend,
            })
        })
        .collect();

    let results = evaluate(TestFamily::WeekdayWeekend, cells, config);
    debug!(tests = results.len(), "Weekday/weekend tests evaluated");
    results
}

/// Each segment in `forward` against the segment at the same position in `backward`,
/// matched on day type and hour.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] when the two lists differ in length.
#[tracing::instrument(skip(series, calendar, config))]
pub fn direction_vs_direction(
    series: &CongestionSeries,
    forward: &[RoadId],
    backward: &[RoadId],
    calendar: &CalendarConfig,
    config: &InferenceConfig,
) -> Result<Vec<HypothesisResult>> {
    if forward.len() != backward.len() {
        return Err(PipelineError::InvalidInput(format!(
            "direction lists differ in length ({} vs {})",
            forward.len(),
            backward.len()
        )));
    }

    let groups: BTreeMap<GroupKey, Vec<Congestion>> = group_by_cell(series, calendar);
    let mut cells = Vec::new();

    for (&a_road, &b_road) in forward.iter().zip(backward) {
        for (key, a) in groups.range(
            GroupKey {
                road_id: a_road,
                is_weekend: false,
                hour_of_day: 0,
            }..=GroupKey {
                road_id: a_road,
                is_weekend: true,
                hour_of_day: u32::MAX,
            },
        ) {
            let Some(b) = groups.get(&GroupKey {
                road_id: b_road,
                ..*key
            }) else {
                continue;
            };
            cells.push(Cell {
                road_id: a_road,
                paired_road_id: Some(b_road),
                is_weekend: Some(key.is_weekend),
                hour_of_day: key.hour_of_day,
                a,
                b,
            });
        }
    }

    let results = evaluate(TestFamily::Direction, cells, config);
    debug!(tests = results.len(), "Direction tests evaluated");
    Ok(results)
}
