//! Segment × time aggregation along a route.
//!
//! The segment list is an input, not something derived: its order is the physical
//! order of segments along a road and is preserved in every output.

use crate::analysis::types::{SegmentDistribution, SegmentMatrix};
use crate::analysis::utility::quantile_sorted;
use crate::error::Result;
use crate::normalize::RoadId;
use crate::series::{CongestionSeries, TimeWindow, bucket_index};
use chrono::TimeDelta;
use std::collections::HashMap;
use tracing::debug;

fn column_index(segments: &[RoadId]) -> HashMap<RoadId, Vec<usize>> {
    let mut columns: HashMap<RoadId, Vec<usize>> = HashMap::new();
    for (i, road) in segments.iter().enumerate() {
        columns.entry(*road).or_default().push(i);
    }
    columns
}

/// Buckets the reports of `segments` inside `window` and averages each cell.
///
/// Every bucket of the window yields a row, even when no requested segment has a
/// report in it.
#[tracing::instrument(skip(series, segments), fields(segment_count = segments.len()))]
pub fn aggregate(
    series: &CongestionSeries,
    segments: &[RoadId],
    window: &TimeWindow,
    bucket_width: TimeDelta,
) -> Result<SegmentMatrix> {
    let bucket_starts = window.buckets(bucket_width)?;
    let columns = column_index(segments);

    let mut sums = vec![vec![0.0; segments.len()]; bucket_starts.len()];
    let mut counts = vec![vec![0usize; segments.len()]; bucket_starts.len()];

    for report in series.iter().filter(|r| window.contains(r.report_time)) {
        let Some(cols) = columns.get(&report.road_id) else {
            continue;
        };
        let row = bucket_index(report.report_time, window.start, bucket_width) as usize;
        if row >= bucket_starts.len() {
            continue;
        }
        for &col in cols {
            sums[row][col] += report.congestion.as_f64();
            counts[row][col] += 1;
        }
    }

    let means = sums
        .iter()
        .zip(&counts)
        .map(|(sum_row, count_row)| {
            sum_row
                .iter()
                .zip(count_row)
                .map(|(&s, &n)| (n > 0).then(|| s / n as f64))
                .collect()
        })
        .collect();

    debug!(rows = bucket_starts.len(), "Segment matrix built");

    Ok(SegmentMatrix {
        bucket_starts,
        segments: segments.to_vec(),
        means,
        counts,
    })
}

/// Per-segment distribution of congestion inside `window`, in segment order.
pub fn distribution(
    series: &CongestionSeries,
    segments: &[RoadId],
    window: &TimeWindow,
) -> Vec<SegmentDistribution> {
    let mut values: HashMap<RoadId, Vec<f64>> = HashMap::new();
    for report in series.restrict(window).iter() {
        values
            .entry(report.road_id)
            .or_default()
            .push(report.congestion.as_f64());
    }
    for v in values.values_mut() {
        v.sort_by(f64::total_cmp);
    }

    segments
        .iter()
        .map(|&road_id| {
            let sorted = values.get(&road_id).map(Vec::as_slice).unwrap_or_default();
            SegmentDistribution {
                road_id,
                sample_size: sorted.len(),
                min: sorted.first().copied(),
                q1: quantile_sorted(sorted, 0.25),
                median: quantile_sorted(sorted, 0.5),
                q3: quantile_sorted(sorted, 0.75),
                max: sorted.last().copied(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::resolve::{Congestion, ResolvedReport};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 1, 25, h, m, 0).unwrap()
    }

    fn series(rows: &[(RoadId, u32, u32, u8)]) -> CongestionSeries {
        let reports = rows
            .iter()
            .enumerate()
            .map(|(i, &(road_id, h, m, level))| ResolvedReport {
                road_id,
                comment_id: format!("c{i}"),
                report_time: at(h, m),
                congestion: Congestion::try_from(level).unwrap(),
            })
            .collect();
        CongestionSeries::from_reports(reports).0
    }

    #[test]
    fn test_single_bucket_only_middle_segment() {
        let s = series(&[(20, 8, 5, 2), (20, 8, 40, 5), (99, 8, 10, 1)]);
        let window = TimeWindow::new(at(8, 0), at(9, 0)).unwrap();
        let m = aggregate(&s, &[30, 20, 10], &window, TimeDelta::hours(1)).unwrap();

        assert_eq!(m.rows(), 1);
        assert_eq!(m.columns(), 3);
        assert_eq!(m.segments, vec![30, 20, 10]);
        assert_eq!(m.cell(0, 0), None);
        assert_eq!(m.cell(0, 1), Some(3.5));
        assert_eq!(m.cell(0, 2), None);
        assert_eq!(m.counts[0], vec![0, 2, 0]);
    }

    #[test]
    fn test_empty_buckets_still_appear() {
        let s = series(&[(1, 8, 5, 2), (2, 10, 15, 4), (1, 11, 0, 3)]);
        let window = TimeWindow::new(at(8, 0), at(11, 0)).unwrap();
        let m = aggregate(&s, &[1, 2], &window, TimeDelta::hours(1)).unwrap();

        assert_eq!(m.bucket_starts, vec![at(8, 0), at(9, 0), at(10, 0)]);
        assert_eq!(m.means[0], vec![Some(2.0), None]);
        assert_eq!(m.means[1], vec![None, None]);
        assert_eq!(m.means[2], vec![None, Some(4.0)]);
    }

    #[test]
    fn test_sub_hour_buckets() {
        let s = series(&[(1, 8, 5, 2), (1, 8, 20, 4), (1, 8, 29, 5)]);
        let window = TimeWindow::new(at(8, 0), at(8, 30)).unwrap();
        let m = aggregate(&s, &[1], &window, TimeDelta::minutes(15)).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cell(0, 0), Some(2.0));
        assert_eq!(m.cell(1, 0), Some(4.5));
    }

    #[test]
    fn test_distribution_keeps_segment_order() {
        let s = series(&[(1, 8, 0, 1), (1, 8, 1, 2), (1, 8, 2, 3), (1, 8, 3, 4), (1, 8, 4, 5)]);
        let window = TimeWindow::new(at(8, 0), at(9, 0)).unwrap();
        let d = distribution(&s, &[7, 1], &window);
        assert_eq!(d[0].road_id, 7);
        assert_eq!(d[0].sample_size, 0);
        assert_eq!(d[0].median, None);
        assert_eq!(d[1].sample_size, 5);
        assert_eq!(d[1].q1, Some(2.0));
        assert_eq!(d[1].median, Some(3.0));
        assert_eq!(d[1].max, Some(5.0));
    }

    #[test]
    fn test_fractional_second_width_is_rejected() {
        let t0 = at(8, 0);
        let s = CongestionSeries::from_reports(vec![ResolvedReport {
            road_id: 1,
            comment_id: "c0".into(),
            report_time: t0 + TimeDelta::milliseconds(2500),
            congestion: Congestion::try_from(3u8).unwrap(),
        }])
        .0;
        let window = TimeWindow::new(t0, t0 + TimeDelta::seconds(3)).unwrap();
        let err = aggregate(&s, &[1], &window, TimeDelta::milliseconds(1500));
        assert!(matches!(err, Err(PipelineError::InvalidInput(_))));

        let m = aggregate(&s, &[1], &window, TimeDelta::seconds(2)).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cell(1, 0), Some(3.0));
    }
}
