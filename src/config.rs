//! Run configuration.
//!
//! Every knob the pipeline exposes lives here rather than as a constant in the stage
//! that uses it. The file format is TOML; every field has a default so an empty file
//! (or no file at all) yields the stock configuration.

use crate::error::ConfigError;
use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeDelta, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BUCKET_MINUTES: i64 = 60;
pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 30;
pub const DEFAULT_ALPHA: f64 = 0.05;
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
pub const DEFAULT_SPEED_BREAKPOINTS: [u32; 4] = [79, 39, 19, 9];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub window: WindowSection,
    pub aggregation: AggregationSection,
    pub calendar: CalendarConfig,
    pub inference: InferenceConfig,
    pub resolver: ResolverConfig,
}

/// Reliable time window `[start, end)`. Either bound may be left open.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowSection {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationSection {
    pub bucket_minutes: i64,
}

impl Default for AggregationSection {
    fn default() -> Self {
        Self {
            bucket_minutes: DEFAULT_BUCKET_MINUTES,
        }
    }
}

impl AggregationSection {
    pub fn bucket_width(&self) -> Result<TimeDelta, ConfigError> {
        TimeDelta::try_minutes(self.bucket_minutes)
            .filter(|w| *w > TimeDelta::zero())
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "aggregation.bucket_minutes {} is out of range",
                    self.bucket_minutes
                ))
            })
    }
}

/// Calendar conventions used to derive hour-of-day and weekend flags from UTC instants.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Days treated as the weekend (Friday/Saturday in the feed's region).
    pub weekend_days: Vec<Weekday>,
    /// Offset of local time from UTC, in minutes.
    pub utc_offset_minutes: i32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            weekend_days: vec![Weekday::Fri, Weekday::Sat],
            utc_offset_minutes: 0,
        }
    }
}

impl CalendarConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn local(&self, t: DateTime<Utc>) -> DateTime<FixedOffset> {
        t.with_timezone(&self.offset())
    }

    pub fn is_weekend(&self, t: DateTime<Utc>) -> bool {
        self.weekend_days.contains(&self.local(t).weekday())
    }

    pub fn hour_of_day(&self, t: DateTime<Utc>) -> u32 {
        self.local(t).hour()
    }
}

/// Thresholds for the inference engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Both sides of a two-sample comparison need at least this many observations.
    pub min_sample_size: usize,
    /// Significance level for rejecting the null hypothesis.
    pub alpha: f64,
    /// Coverage of the confidence intervals for grouped means.
    pub confidence_level: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            alpha: DEFAULT_ALPHA,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }
}

/// Report-code partition and the speed remap used by the congestion resolver.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Lower speed bounds (exclusive, km/h) for codes 1 through 4; anything at or
    /// below the last bound is code 5.
    pub speed_breakpoints: [u32; 4],
    pub question_codes: Vec<u16>,
    pub incident_codes: Vec<u16>,
    pub free_text_codes: Vec<u16>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            speed_breakpoints: DEFAULT_SPEED_BREAKPOINTS,
            question_codes: vec![6],
            incident_codes: vec![7, 8, 9],
            free_text_codes: vec![10],
        }
    }
}

impl PipelineConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(start), Some(end)) = (self.window.start, self.window.end) {
            if start >= end {
                return Err(ConfigError::Invalid(format!(
                    "window start {start} is not before end {end}"
                )));
            }
        }
        if self.aggregation.bucket_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "aggregation.bucket_minutes must be positive".into(),
            ));
        }
        self.aggregation.bucket_width()?;
        if FixedOffset::east_opt(self.calendar.utc_offset_minutes * 60).is_none() {
            return Err(ConfigError::Invalid(format!(
                "calendar.utc_offset_minutes {} is out of range",
                self.calendar.utc_offset_minutes
            )));
        }
        if self.inference.min_sample_size < 2 {
            return Err(ConfigError::Invalid(
                "inference.min_sample_size must be at least 2".into(),
            ));
        }
        if !(self.inference.alpha > 0.0 && self.inference.alpha < 1.0) {
            return Err(ConfigError::Invalid("inference.alpha must be in (0, 1)".into()));
        }
        if !(self.inference.confidence_level > 0.0 && self.inference.confidence_level < 1.0) {
            return Err(ConfigError::Invalid(
                "inference.confidence_level must be in (0, 1)".into(),
            ));
        }
        if !self.resolver.speed_breakpoints.windows(2).all(|w| w[0] > w[1]) {
            return Err(ConfigError::Invalid(
                "resolver.speed_breakpoints must be strictly descending".into(),
            ));
        }
        let r = &self.resolver;
        for code in r
            .question_codes
            .iter()
            .chain(&r.incident_codes)
            .chain(&r.free_text_codes)
        {
            if (1..=5).contains(code) {
                return Err(ConfigError::Invalid(format!(
                    "report code {code} is reserved for congestion scores"
                )));
            }
        }
        Ok(())
    }
}
