//! Output formatting and persistence for the typed tables.
//!
//! Supports pretty-printing, JSON, and CSV (gzip-compressed when the path ends in
//! `.gz`), plus reloading the series and road tables written by a previous run.

use crate::analysis::types::SegmentMatrix;
use crate::error::Result;
use crate::ingest::open_input;
use crate::normalize::{RoadIdentity, RoadRow};
use crate::resolve::ResolvedReport;
use crate::series::CongestionSeries;
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn create_output(path: &Path) -> Result<Box<dyn Write>> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = BufWriter::new(File::create(path)?);
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzEncoder::new(file, Compression::default())))
    } else {
        Ok(Box::new(file))
    }
}

/// Writes `rows` as a CSV table with a header row, replacing any existing file.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing CSV table");
    let mut writer = WriterBuilder::new().from_writer(create_output(path)?);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Appends a single record to a CSV file, writing the header only when the file is new.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// Writes any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut out = create_output(path)?;
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Writes a segment matrix with one row per bucket and one column per segment.
/// Missing cells are left empty.
pub fn write_matrix(path: &Path, matrix: &SegmentMatrix, labels: &[String]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(create_output(path)?);

    let mut header = vec!["bucket_start".to_string()];
    header.extend(labels.iter().cloned());
    writer.write_record(&header)?;

    for (start, row) in matrix.bucket_starts.iter().zip(&matrix.means) {
        let mut record = vec![start.to_rfc3339()];
        record.extend(row.iter().map(|cell| match cell {
            Some(v) => v.to_string(),
            None => String::new(),
        }));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_reader(open_input(path)?);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: T = result?;
        rows.push(record);
    }
    Ok(rows)
}

/// Loads a series previously written with [`write_csv`].
pub fn read_series(path: &Path) -> Result<CongestionSeries> {
    let rows: Vec<ResolvedReport> = read_csv(path)?;
    let (series, duplicates) = CongestionSeries::from_reports(rows);
    debug!(rows = series.len(), duplicates, "Series loaded");
    Ok(series)
}

/// Loads a road table previously written with [`write_csv`].
pub fn read_roads(path: &Path) -> Result<RoadIdentity> {
    let rows: Vec<RoadRow> = read_csv(path)?;
    Ok(RoadIdentity::from_rows(rows)?)
}
