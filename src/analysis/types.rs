//! Table types handed to the presentation layer.

use crate::normalize::RoadId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Grouping key for hourly statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey {
    pub road_id: RoadId,
    pub is_weekend: bool,
    pub hour_of_day: u32,
}

/// Descriptive statistics for one `(road, weekend, hour)` cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentralTendencyRow {
    pub road_id: RoadId,
    pub is_weekend: bool,
    pub hour_of_day: u32,
    pub mean: f64,
    /// Sample variance; absent for a single observation.
    pub variance: Option<f64>,
    pub stddev: Option<f64>,
    pub median: f64,
    pub mode: u8,
    pub sample_size: usize,
}

/// Two-sided t interval for the mean of one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceIntervalRow {
    pub road_id: RoadId,
    pub is_weekend: bool,
    pub hour_of_day: u32,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub degrees_of_freedom: usize,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestFamily {
    /// A segment against its opposite-direction twin at the same hour and day type.
    Direction,
    /// Weekday against weekend for the same road and hour.
    WeekdayWeekend,
}

/// One evaluated two-sample test.
///
/// For [`TestFamily::Direction`], side A is `road_id`, side B is `paired_road_id` and
/// `is_weekend` names the day type. For [`TestFamily::WeekdayWeekend`], side A is
/// weekdays, side B is weekends and `paired_road_id`/`is_weekend` are empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypothesisResult {
    pub family: TestFamily,
    pub road_id: RoadId,
    pub paired_road_id: Option<RoadId>,
    pub is_weekend: Option<bool>,
    pub hour_of_day: u32,
    pub sample_size_a: usize,
    pub sample_size_b: usize,
    pub mean_a: f64,
    pub mean_b: f64,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub reject_null: bool,
}

/// Time × segment grid of mean congestion.
///
/// Rows are bucket starts in ascending order; columns follow the caller's segment
/// order exactly. `None` marks a cell with no reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentMatrix {
    pub bucket_starts: Vec<DateTime<Utc>>,
    pub segments: Vec<RoadId>,
    pub means: Vec<Vec<Option<f64>>>,
    pub counts: Vec<Vec<usize>>,
}

impl SegmentMatrix {
    pub fn rows(&self) -> usize {
        self.bucket_starts.len()
    }

    pub fn columns(&self) -> usize {
        self.segments.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<f64> {
        self.means.get(row)?.get(column).copied().flatten()
    }
}

/// Five-number summary of one segment's reports, for box plots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentDistribution {
    pub road_id: RoadId,
    pub sample_size: usize,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
}
