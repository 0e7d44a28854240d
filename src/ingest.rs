//! CSV ingestion adapter for the raw crawl feed.
//!
//! Every field is kept as text so malformed values reach the normalizer, which owns
//! the decision to drop a row. Columns not listed on [`RawRecord`] (advertising,
//! images, reporter names) are ignored by the deserializer.

use crate::error::{ParseError, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// One crawl-time observation of a road and its latest report, as read from the feed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawRecord {
    #[serde(rename = "crawl_date", default)]
    pub crawl_time: Option<String>,
    #[serde(rename = "rd.ri", default)]
    pub road_id: Option<String>,
    #[serde(rename = "rd.nm", default)]
    pub road_name: Option<String>,
    /// Road-level status snapshot. Only carried until deduplication.
    #[serde(rename = "rd.stid", default)]
    pub road_status_id: Option<String>,
    #[serde(rename = "rd.hr", default)]
    pub road_update_hours: Option<String>,
    #[serde(rename = "rd.mn", default)]
    pub road_update_minutes: Option<String>,
    #[serde(rename = "rd.rp.hr", default)]
    pub report_hours: Option<String>,
    #[serde(rename = "rd.rp.mn", default)]
    pub report_minutes: Option<String>,
    #[serde(rename = "rd.rp.stid", default)]
    pub status_id: Option<String>,
    #[serde(rename = "rd.rp.cm", default)]
    pub comment_text: Option<String>,
    #[serde(rename = "rd.rp.cmid", default)]
    pub comment_id: Option<String>,
}

/// Opens `path` for reading, transparently decompressing `.gz` files.
pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(path)?);
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        debug!(path = %path.display(), "Reading gzip-compressed input");
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Reads every row of a raw feed CSV.
///
/// Rows the CSV reader cannot decode come back as [`ParseError::Malformed`] so the
/// caller can count them alongside other decode failures.
pub fn read_raw_records<R: Read>(reader: R) -> Vec<Result<RawRecord, ParseError>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    rdr.deserialize::<RawRecord>()
        .map(|row| row.map_err(|e| ParseError::Malformed(e.to_string())))
        .collect()
}

/// Convenience wrapper around [`open_input`] and [`read_raw_records`].
pub fn load_raw_records(path: &Path) -> Result<Vec<Result<RawRecord, ParseError>>> {
    let reader = open_input(path)?;
    let records = read_raw_records(reader);
    debug!(path = %path.display(), rows = records.len(), "Raw feed loaded");
    Ok(records)
}
