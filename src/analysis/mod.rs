//! Aggregation and inference over the congestion series.
//!
//! Segment matrices for route heatmaps, descriptive statistics and confidence
//! intervals per `(road, weekend, hour)` cell, and two-sample tests between cells.

pub mod distribution;
pub mod hypothesis;
pub mod segments;
pub mod tendency;
pub mod types;
pub mod utility;

use crate::config::CalendarConfig;
use crate::resolve::Congestion;
use crate::series::CongestionSeries;
use std::collections::BTreeMap;
use types::GroupKey;

/// Groups congestion values by `(road, weekend, hour)`. Within a group, values keep
/// series order.
pub fn group_by_cell(
    series: &CongestionSeries,
    calendar: &CalendarConfig,
) -> BTreeMap<GroupKey, Vec<Congestion>> {
    let mut groups: BTreeMap<GroupKey, Vec<Congestion>> = BTreeMap::new();
    for r in series.iter() {
        let key = GroupKey {
            road_id: r.road_id,
            is_weekend: calendar.is_weekend(r.report_time),
            hour_of_day: calendar.hour_of_day(r.report_time),
        };
        groups.entry(key).or_default().push(r.congestion);
    }
    groups
}

pub(crate) fn as_f64(values: &[Congestion]) -> Vec<f64> {
    values.iter().map(|c| c.as_f64()).collect()
}
