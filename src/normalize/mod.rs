//! Record normalization.
//!
//! Turns raw crawl rows into deduplicated, absolutely-timed reports plus the road
//! identity table. Rows that fail to decode are dropped and counted; a road identity
//! conflict aborts the run.

pub mod dedup;
pub mod roads;
pub mod time;

pub use dedup::{Deduplicated, deduplicate};
pub use roads::{NO_MINOR, RoadIdentity, RoadName, RoadRow};

use crate::error::{IntegrityError, ParseError};
use crate::ingest::RawRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use time::{parse_count, parse_crawl_time, subtract_age};
use tracing::{debug, warn};

pub type RoadId = u32;

/// A report with crawl-only fields stripped. Equality covers every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NormalizedReport {
    pub road_id: RoadId,
    pub report_code: u16,
    pub comment_id: String,
    pub comment_text: Option<String>,
    pub report_time: DateTime<Utc>,
}

/// A fully decoded crawl row, including the fields that only make sense per crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub report: NormalizedReport,
    pub name: RoadName,
    pub crawl_time: DateTime<Utc>,
    pub last_update_time: Option<DateTime<Utc>>,
    pub road_status_id: Option<u16>,
}

impl DecodedRow {
    pub fn into_report(self) -> NormalizedReport {
        self.report
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub raw_rows: usize,
    pub dropped_decode: usize,
    pub exact_duplicates: usize,
    pub near_duplicates: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub reports: Vec<NormalizedReport>,
    pub roads: RoadIdentity,
    pub stats: NormalizeStats,
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, ParseError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ParseError::MissingField(field)),
    }
}

fn code(field: &'static str, value: &str) -> Result<u16, ParseError> {
    let n = parse_count(field, value)?;
    u16::try_from(n).map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Decodes one raw row.
///
/// A missing minutes field next to a present hours field counts as zero minutes.
pub fn decode_record(raw: &RawRecord) -> Result<DecodedRow, ParseError> {
    let crawl_time = parse_crawl_time(required("crawl_date", &raw.crawl_time)?)?;

    let road_id = parse_count("rd.ri", required("rd.ri", &raw.road_id)?)?;
    let road_id = RoadId::try_from(road_id).map_err(|_| ParseError::InvalidNumber {
        field: "rd.ri",
        value: road_id.to_string(),
    })?;
    let name = RoadName::split(required("rd.nm", &raw.road_name)?);

    let report_hours = parse_count("rd.rp.hr", required("rd.rp.hr", &raw.report_hours)?)?;
    let report_minutes = match raw.report_minutes.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => parse_count("rd.rp.mn", v)?,
        _ => 0,
    };
    let report_time = subtract_age("rd.rp.hr", crawl_time, report_hours, report_minutes)?;

    let last_update_time = match raw.road_update_hours.as_deref().map(str::trim) {
        Some(h) if !h.is_empty() => {
            let hours = parse_count("rd.hr", h)?;
            let minutes = match raw.road_update_minutes.as_deref().map(str::trim) {
                Some(m) if !m.is_empty() => parse_count("rd.mn", m)?,
                _ => 0,
            };
            Some(subtract_age("rd.hr", crawl_time, hours, minutes)?)
        }
        _ => None,
    };

    let road_status_id = match raw.road_status_id.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(code("rd.stid", v)?),
        _ => None,
    };

    let report_code = code("rd.rp.stid", required("rd.rp.stid", &raw.status_id)?)?;
    let comment_id = raw
        .comment_id
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let comment_text = raw
        .comment_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(DecodedRow {
        report: NormalizedReport {
            road_id,
            report_code,
            comment_id,
            comment_text,
            report_time,
        },
        name,
        crawl_time,
        last_update_time,
        road_status_id,
    })
}

/// Runs the whole normalization stage over a batch of raw rows.
///
/// # Errors
///
/// Returns [`IntegrityError`] when the road ids and name pairs are not one-to-one.
#[tracing::instrument(skip_all)]
pub fn normalize<I>(records: I) -> Result<Normalized, IntegrityError>
where
    I: IntoIterator<Item = Result<RawRecord, ParseError>>,
{
    let mut stats = NormalizeStats::default();
    let mut decoded = Vec::new();

    for record in records {
        stats.raw_rows += 1;
        match record.and_then(|raw| decode_record(&raw)) {
            Ok(row) => decoded.push(row),
            Err(e) => {
                stats.dropped_decode += 1;
                debug!(row = stats.raw_rows, error = %e, "Dropping undecodable row");
            }
        }
    }

    if stats.dropped_decode > 0 {
        warn!(
            dropped = stats.dropped_decode,
            total = stats.raw_rows,
            "Rows dropped at decode"
        );
    }

    let roads = RoadIdentity::build(decoded.iter().map(|row| (row.report.road_id, &row.name)))?;

    let reports: Vec<NormalizedReport> = decoded.into_iter().map(DecodedRow::into_report).collect();
    let Deduplicated {
        reports,
        exact_duplicates,
        near_duplicates,
    } = deduplicate(reports);
    stats.exact_duplicates = exact_duplicates;
    stats.near_duplicates = near_duplicates;

    debug!(
        roads = roads.len(),
        reports = reports.len(),
        exact_duplicates,
        near_duplicates,
        "Normalization complete"
    );

    Ok(Normalized {
        reports,
        roads,
        stats,
    })
}
