//! Descriptive statistics and confidence intervals per hourly cell.

use crate::analysis::distribution::t_quantile;
use crate::analysis::types::{CentralTendencyRow, ConfidenceIntervalRow, GroupKey};
use crate::analysis::utility::{mean, median, mode, sample_variance};
use crate::analysis::{as_f64, group_by_cell};
use crate::config::CalendarConfig;
use crate::resolve::Congestion;
use crate::series::CongestionSeries;
use rayon::prelude::*;
use tracing::debug;

fn describe(key: GroupKey, values: &[Congestion]) -> Option<CentralTendencyRow> {
    let samples = as_f64(values);
    let avg = mean(&samples);
    let variance = sample_variance(&samples, avg);
    Some(CentralTendencyRow {
        road_id: key.road_id,
        is_weekend: key.is_weekend,
        hour_of_day: key.hour_of_day,
        mean: avg,
        variance,
        stddev: variance.map(f64::sqrt),
        median: median(&samples)?,
        mode: mode(values)?.value(),
        sample_size: values.len(),
    })
}

/// One row per observed `(road, weekend, hour)` cell, sorted by that key.
#[tracing::instrument(skip_all, fields(reports = series.len()))]
pub fn central_tendency(
    series: &CongestionSeries,
    calendar: &CalendarConfig,
) -> Vec<CentralTendencyRow> {
    let groups: Vec<_> = group_by_cell(series, calendar).into_iter().collect();
    let rows: Vec<_> = groups
        .par_iter()
        .filter_map(|(key, values)| describe(*key, values))
        .collect();
    debug!(cells = rows.len(), "Central tendency computed");
    rows
}

/// Two-sided t interval `mean ± t((1 + level) / 2, n − 1) · s / √n`.
///
/// Returns `None` for fewer than two values, where the interval is undefined.
pub fn mean_interval(values: &[f64], level: f64) -> Option<(f64, f64)> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let avg = mean(values);
    let sd = sample_variance(values, avg)?.sqrt();
    let t = t_quantile((1.0 + level) / 2.0, (n - 1) as f64)?;
    let half_width = t * sd / (n as f64).sqrt();
    Some((avg - half_width, avg + half_width))
}

/// Confidence intervals for every cell with more than one observation.
#[tracing::instrument(skip_all, fields(reports = series.len(), level = level))]
pub fn confidence_intervals(
    series: &CongestionSeries,
    calendar: &CalendarConfig,
    level: f64,
) -> Vec<ConfidenceIntervalRow> {
    let groups: Vec<_> = group_by_cell(series, calendar)
        .into_iter()
        .filter(|(_, values)| values.len() > 1)
        .collect();

    let rows: Vec<_> = groups
        .par_iter()
        .filter_map(|(key, values)| {
            let samples = as_f64(values);
            let (lower, upper) = mean_interval(&samples, level)?;
            Some(ConfidenceIntervalRow {
                road_id: key.road_id,
                is_weekend: key.is_weekend,
                hour_of_day: key.hour_of_day,
                mean: mean(&samples),
                lower,
                upper,
                degrees_of_freedom: samples.len() - 1,
                sample_size: samples.len(),
            })
        })
        .collect();
    debug!(cells = rows.len(), "Confidence intervals computed");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResolvedReport;
    use chrono::{TimeZone, Utc};

    fn series(rows: &[(u32, u32, u32, u8)]) -> CongestionSeries {
        // (road, day of Jan 2016, hour, level); Jan 29 2016 is a Friday.
        let reports = rows
            .iter()
            .enumerate()
            .map(|(i, &(road_id, day, hour, level))| ResolvedReport {
                road_id,
                comment_id: format!("c{i}"),
                report_time: Utc.with_ymd_and_hms(2016, 1, day, hour, i as u32 % 60, 0).unwrap(),
                congestion: Congestion::try_from(level).unwrap(),
            })
            .collect();
        CongestionSeries::from_reports(reports).0
    }

    #[test]
    fn test_central_tendency_groups_by_weekend_and_hour() {
        let s = series(&[
            (1, 25, 8, 2),
            (1, 25, 8, 4),
            (1, 26, 8, 4),
            (1, 29, 8, 5),
            (1, 25, 9, 1),
        ]);
        let rows = central_tendency(&s, &CalendarConfig::default());
        assert_eq!(rows.len(), 3);

        let weekday_8 = &rows[0];
        assert_eq!((weekday_8.is_weekend, weekday_8.hour_of_day), (false, 8));
        assert_eq!(weekday_8.sample_size, 3);
        assert!((weekday_8.mean - 10.0 / 3.0).abs() < 1e-12);
        assert_eq!(weekday_8.median, 4.0);
        assert_eq!(weekday_8.mode, 4);
        assert!((weekday_8.variance.unwrap() - 4.0 / 3.0).abs() < 1e-12);

        let weekday_9 = &rows[1];
        assert_eq!(weekday_9.hour_of_day, 9);
        assert_eq!(weekday_9.variance, None);

        let weekend_8 = &rows[2];
        assert!(weekend_8.is_weekend);
        assert_eq!(weekend_8.mode, 5);
    }

    #[test]
    fn test_mode_tie_uses_first_in_series_order() {
        let s = series(&[(1, 25, 8, 3), (1, 25, 8, 1), (1, 25, 8, 1), (1, 25, 8, 3)]);
        let rows = central_tendency(&s, &CalendarConfig::default());
        assert_eq!(rows[0].mode, 3);
    }

    #[test]
    fn test_interval_excludes_single_observation() {
        let s = series(&[(1, 25, 8, 2), (2, 25, 8, 2), (2, 25, 8, 4)]);
        let rows = confidence_intervals(&s, &CalendarConfig::default(), 0.95);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.road_id, 2);
        assert_eq!(row.degrees_of_freedom, 1);
        // mean 3, sd √2, n 2 → half width 12.7062·√2/√2.
        assert!((row.lower - (3.0 - 12.706_204_7)).abs() < 1e-5);
        assert!((row.upper - (3.0 + 12.706_204_7)).abs() < 1e-5);
    }

    #[test]
    fn test_mean_interval_shrinks_with_n() {
        let small = mean_interval(&[1.0, 2.0, 3.0, 4.0], 0.95).unwrap();
        let large = mean_interval(&[1.0, 2.0, 3.0, 4.0].repeat(10), 0.95).unwrap();
        assert!(large.1 - large.0 < small.1 - small.0);
        assert_eq!(mean_interval(&[1.0], 0.95), None);
    }
}
