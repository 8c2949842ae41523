//! Loading aligned price and return tables from CSV.
//!
//! Files are "wide": the first column is a date, every other column is one
//! asset, e.g.
//!
//! ```text
//! Date,SPY,AGG,GLD
//! 2024-01-02,472.65,95.93,190.02
//! 2024-01-03,468.79,96.11,189.51
//! ```
//!
//! Rows are sorted by date and duplicate dates dropped. Rows with a missing
//! or unparsable cell are skipped by default so that every asset covers the
//! same periods.

use crate::error::{Result, SimError};
use crate::replay::PriceHistory;
use crate::types::AssetReturnSeries;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// Options for reading a wide CSV table.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Date format string (e.g. "%Y-%m-%d"). Common formats are tried if None.
    pub date_format: Option<String>,
    /// CSV delimiter character. If None, delimiter is auto-detected.
    pub delimiter: Option<u8>,
    /// Skip incomplete or invalid rows instead of failing.
    pub skip_invalid: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            delimiter: None,
            skip_invalid: true,
        }
    }
}

/// A date-indexed table of per-asset values.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedTable {
    pub assets: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

/// Pick the delimiter that gives a consistent column count over the first lines.
fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().take(5).filter_map(|l| l.ok()).collect();

    if lines.is_empty() {
        return Ok(b',');
    }

    let delimiters = [b',', b'\t', b';', b'|'];
    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delim in &delimiters {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.as_bytes().iter().filter(|&&b| b == delim).count() + 1)
            .collect();
        let first = counts[0];
        // Need a date column plus at least one asset.
        if first >= 2 && counts.iter().all(|&c| c == first) && first > best_score {
            best_score = first;
            best_delimiter = delim;
        }
    }

    debug!(
        "Detected delimiter {:?} with {} columns",
        best_delimiter as char, best_score
    );
    Ok(best_delimiter)
}

/// Parse a date, accepting date-only, datetime and Unix timestamp forms.
fn parse_date(s: &str, format: Option<&str>) -> Result<NaiveDate> {
    let s = s.trim();
    if let Some(fmt) = format {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y", "%m/%d/%Y", "%d-%b-%Y", "%b %d, %Y"];
    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }

    let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"];
    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    if let Ok(ts) = s.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(ts, 0) {
            return Ok(dt.date_naive());
        }
    }

    Err(SimError::DataError(format!("Could not parse date: '{}'", s)))
}

fn parse_cell(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read a wide CSV table into dates, asset names and numeric rows.
pub fn load_table(path: impl AsRef<Path>, config: &TableConfig) -> Result<DatedTable> {
    let path = path.as_ref();
    info!("Loading table from: {}", path.display());

    let delimiter = match config.delimiter {
        Some(d) => d,
        None => detect_delimiter(path)?,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(SimError::DataError(
            "Table needs a date column and at least one asset column".to_string(),
        ));
    }
    let assets: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut entries: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
    let mut skipped = 0;

    for (row_num, record) in reader.records().enumerate() {
        let record = record?;
        let parsed = record
            .get(0)
            .ok_or_else(|| SimError::DataError(format!("Row {} is empty", row_num + 1)))
            .and_then(|d| parse_date(d, config.date_format.as_deref()))
            .and_then(|date| {
                let values: Option<Vec<f64>> =
                    (1..=assets.len()).map(|i| record.get(i).and_then(parse_cell)).collect();
                values.map(|v| (date, v)).ok_or_else(|| {
                    SimError::DataError(format!("Row {} has missing or invalid values", row_num + 1))
                })
            });

        match parsed {
            Ok(entry) => entries.push(entry),
            Err(e) if config.skip_invalid => {
                debug!("Skipping row {}: {}", row_num + 1, e);
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if skipped > 0 {
        warn!("Skipped {} incomplete rows", skipped);
    }

    entries.sort_by_key(|(d, _)| *d);
    let original_len = entries.len();
    entries.dedup_by_key(|(d, _)| *d);
    if entries.len() < original_len {
        warn!("Removed {} duplicate dates", original_len - entries.len());
    }

    if entries.is_empty() {
        return Err(SimError::DataError(format!(
            "No usable rows in {}",
            path.display()
        )));
    }

    info!(
        "Loaded {} rows for {} assets from {} to {}",
        entries.len(),
        assets.len(),
        entries[0].0,
        entries[entries.len() - 1].0
    );

    let (dates, rows): (Vec<NaiveDate>, Vec<Vec<f64>>) = entries.into_iter().unzip();
    Ok(DatedTable {
        assets,
        dates,
        rows,
    })
}

/// Load a price table for historical replay.
pub fn load_prices_csv(path: impl AsRef<Path>, config: &TableConfig) -> Result<PriceHistory> {
    let table = load_table(path, config)?;
    PriceHistory::new(table.assets, table.rows)
}

/// Load a table of per-period returns.
pub fn load_returns_csv(path: impl AsRef<Path>, config: &TableConfig) -> Result<AssetReturnSeries> {
    let table = load_table(path, config)?;
    AssetReturnSeries::new(table.assets, table.rows)
}

/// Load a price table and convert it to per-period returns.
pub fn load_returns_from_prices(path: impl AsRef<Path>, config: &TableConfig) -> Result<AssetReturnSeries> {
    load_prices_csv(path, config)?.to_returns()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_price_csv() -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Date,SPY,AGG").unwrap();
        writeln!(file, "2024-01-03,110,50").unwrap();
        writeln!(file, "2024-01-01,100,50").unwrap();
        writeln!(file, "2024-01-02,,51").unwrap();
        writeln!(file, "2024-01-04,121,55").unwrap();
        file
    }

    #[test]
    fn test_load_prices_sorted_and_complete() {
        let file = create_price_csv();
        let table = load_table(file.path(), &TableConfig::default()).unwrap();
        assert_eq!(table.assets, vec!["SPY", "AGG"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.dates[0], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(table.rows[0], vec![100.0, 50.0]);
    }

    #[test]
    fn test_strict_mode_rejects_missing_values() {
        let file = create_price_csv();
        let config = TableConfig {
            skip_invalid: false,
            ..Default::default()
        };
        assert!(matches!(
            load_table(file.path(), &config),
            Err(SimError::DataError(_))
        ));
    }

    #[test]
    fn test_returns_from_prices() {
        let file = create_price_csv();
        let series = load_returns_from_prices(file.path(), &TableConfig::default()).unwrap();
        assert_eq!(series.num_periods(), 2);
        let spy = series.column("SPY").unwrap();
        assert!((spy[0] - 0.10).abs() < 1e-12);
        assert!((spy[1] - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_semicolon_delimiter() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "date;A;B").unwrap();
        writeln!(file, "2024-02-01;0.01;0.02").unwrap();
        writeln!(file, "2024-02-02;-0.01;0.00").unwrap();
        let series = load_returns_csv(file.path(), &TableConfig::default()).unwrap();
        assert_eq!(series.assets(), &["A".to_string(), "B".to_string()]);
        assert_eq!(series.num_periods(), 2);
    }

    #[test]
    fn test_date_parsing() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("2024-01-15", None).unwrap(), d);
        assert_eq!(parse_date("15-Jan-2024", None).unwrap(), d);
        assert_eq!(parse_date("2024-01-15 09:30:00", None).unwrap(), d);
        assert!(parse_date("yesterday", None).is_err());
    }
}
