//! CSV ingest.
//!
//! Turns a case-count CSV into raw `(date, value)` rows for the series
//! preparer. Two layouts are understood:
//!
//! - **long**: one row per day, with a date column (`date` or `ds`) and a value
//!   column (`value`, `y` or `cases`); headers are case-insensitive
//! - **wide**: the JHU global time series layout
//!   (`Province/State, Country/Region, Lat, Long, 1/22/20, 1/23/20, ...`),
//!   where every row of the requested country is summed per date column
//!
//! Dates stay as strings here; parsing happens in the preparer so both layouts
//! share one set of accepted formats.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{InputFormat, RawRow};
use crate::error::{ForecastError, Result};

const DATE_COLUMNS: [&str; 2] = ["date", "ds"];
const VALUE_COLUMNS: [&str; 3] = ["value", "y", "cases"];
const WIDE_REGION_COLUMN: &str = "country/region";
const WIDE_META_COLUMNS: [&str; 4] = ["province/state", "country/region", "lat", "long"];

/// Ingest output: raw rows plus what was read.
#[derive(Debug, Clone)]
pub struct IngestedRows {
    pub rows: Vec<RawRow>,
    pub format: InputFormat,
    /// Data lines read from the file.
    pub records_read: usize,
    /// Wide format only: region rows that were summed.
    pub regions_matched: usize,
}

/// Load a CSV from disk.
pub fn load_rows(path: &Path, format: InputFormat, region: Option<&str>) -> Result<IngestedRows> {
    let file = File::open(path).map_err(|e| ForecastError::io(format!("failed to open CSV '{}'", path.display()), e))?;
    let ingested = read_rows(file, format, region)?;
    info!(
        path = %path.display(),
        format = ?ingested.format,
        records = ingested.records_read,
        rows = ingested.rows.len(),
        "csv loaded"
    );
    Ok(ingested)
}

/// Parse CSV content from any reader.
pub fn read_rows<R: Read>(reader: R, format: InputFormat, region: Option<&str>) -> Result<IngestedRows> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| ForecastError::MalformedInput(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let format = match format {
        InputFormat::Auto if header_map.contains_key(WIDE_REGION_COLUMN) => InputFormat::Wide,
        InputFormat::Auto => InputFormat::Long,
        explicit => explicit,
    };
    debug!(?format, columns = headers.len(), "csv layout resolved");

    match format {
        InputFormat::Wide => {
            let region = region.ok_or_else(|| {
                ForecastError::InvalidConfig("wide (JHU) input requires --region".to_string())
            })?;
            read_wide(&mut reader, &headers, &header_map, region)
        }
        _ => read_long(&mut reader, &header_map),
    }
}

fn read_long<R: Read>(reader: &mut csv::Reader<R>, header_map: &HashMap<String, usize>) -> Result<IngestedRows> {
    let date_idx = find_column(header_map, &DATE_COLUMNS)?;
    let value_idx = find_column(header_map, &VALUE_COLUMNS)?;

    let mut rows = Vec::new();
    let mut records_read = 0usize;
    for (idx, result) in reader.records().enumerate() {
        // +2: header line plus 1-based numbering.
        let line = idx + 2;
        records_read += 1;
        let record = result.map_err(|e| ForecastError::MalformedInput(format!("line {line}: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let date = get_required(&record, date_idx, "date", line)?;
        let value = parse_value(get_required(&record, value_idx, "value", line)?, line)?;
        rows.push(RawRow::new(date, value));
    }

    Ok(IngestedRows {
        rows,
        format: InputFormat::Long,
        records_read,
        regions_matched: 0,
    })
}

fn read_wide<R: Read>(
    reader: &mut csv::Reader<R>,
    headers: &StringRecord,
    header_map: &HashMap<String, usize>,
    region: &str,
) -> Result<IngestedRows> {
    let region_idx = find_column(header_map, &[WIDE_REGION_COLUMN])?;
    let date_columns: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !WIDE_META_COLUMNS.contains(&normalize_header_name(h).as_str()))
        .collect();
    if date_columns.is_empty() {
        return Err(ForecastError::MalformedInput("wide CSV has no date columns".to_string()));
    }

    let mut totals = vec![0.0; date_columns.len()];
    let mut records_read = 0usize;
    let mut regions_matched = 0usize;
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        records_read += 1;
        let record = result.map_err(|e| ForecastError::MalformedInput(format!("line {line}: {e}")))?;
        let matches = record
            .get(region_idx)
            .is_some_and(|r| r.eq_ignore_ascii_case(region.trim()));
        if !matches {
            continue;
        }
        regions_matched += 1;
        for (total, &(col, header)) in totals.iter_mut().zip(&date_columns) {
            let cell = get_required(&record, col, header, line)?;
            *total += parse_value(cell, line)?;
        }
    }

    if regions_matched == 0 {
        return Err(ForecastError::MalformedInput(format!("no rows found for region '{region}'")));
    }
    debug!(region, regions_matched, dates = date_columns.len(), "wide rows aggregated");

    let rows = date_columns
        .iter()
        .zip(totals)
        .map(|(&(_, header), total)| RawRow::new(header, total))
        .collect();
    Ok(IngestedRows {
        rows,
        format: InputFormat::Wide,
        records_read,
        regions_matched,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, candidates: &[&str]) -> Result<usize> {
    candidates
        .iter()
        .find_map(|c| header_map.get(*c).copied())
        .ok_or_else(|| {
            let names: Vec<String> = candidates.iter().map(|c| format!("`{c}`")).collect();
            ForecastError::MalformedInput(format!("missing required column: one of {}", names.join(", ")))
        })
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str, line: usize) -> Result<&'a str> {
    record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ForecastError::MalformedInput(format!("line {line}: missing value for `{name}`")))
}

fn parse_value(s: &str, line: usize) -> Result<f64> {
    s.parse::<f64>()
        .map_err(|_| ForecastError::MalformedInput(format!("line {line}: '{s}' is not a number")))
}
