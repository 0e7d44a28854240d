//! Error taxonomy for the reconstruction pipeline.
//!
//! Row-level errors ([`ParseError`], [`ResolveError`]) are recoverable: the offending
//! row is dropped and counted in the [`RunSummary`](crate::summary::RunSummary).
//! [`IntegrityError`] aborts the whole run.

use crate::normalize::RoadId;
use thiserror::Error;

/// Failure to decode a raw row into typed fields.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("crawl time {value:?} does not match the crawl timestamp pattern: {source}")]
    CrawlTime {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("field {field} has non-numeric value {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("field {field} holds an age {value} outside the representable time range")]
    AgeOutOfRange { field: &'static str, value: String },
    #[error("row could not be read: {0}")]
    Malformed(String),
}

/// Violation of the one-name-pair-per-road invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("road {road_id} is named both {first:?} and {second:?}")]
    ConflictingNames {
        road_id: RoadId,
        first: (String, String),
        second: (String, String),
    },
    #[error("name pair {name:?} is shared by roads {first} and {second}")]
    SharedName {
        name: (String, String),
        first: RoadId,
        second: RoadId,
    },
}

/// Why a normalized report did not make it into the congestion series.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("question report carries no congestion signal")]
    Question,
    #[error("incident report (code {0}) is not a congestion report")]
    Incident(u16),
    #[error("unknown report code {0}")]
    UnknownCode(u16),
    #[error("free-text status report {comment_id:?} has no extractable speed")]
    UnresolvedCongestion { comment_id: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("road identity integrity violated: {0}")]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
