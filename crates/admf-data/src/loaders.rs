//! CSV bar loading (§6). The teacher's own loader shelled out to a
//! commented-out Polars DataFrame path; this one actually reads rows.

use std::path::Path;

use admf_types::errors::{GbError, GbResult};
use admf_types::market::{Bar, Symbol};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// One CSV row, case-insensitively matched against the documented column
/// names (§6): `timestamp,open,high,low,close,volume`. `csv`'s header
/// matching is exact, so the reader lower-cases headers itself before
/// deserializing (see `CsvBarLoader::load`).
#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

/// Timestamp formats tried in order when the row's `timestamp` column
/// doesn't parse as RFC3339.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d",
];

fn parse_timestamp(raw: &str) -> GbResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
        }
    }
    Err(GbError::Validation(format!("unrecognized timestamp: {raw}")))
}

/// Loads one symbol's bar series from a CSV file. The symbol is taken from
/// the file stem (e.g. `MINI.csv` -> `MINI`) unless overridden.
pub struct CsvBarLoader;

impl CsvBarLoader {
    /// Reads `path`, sorts by timestamp, and tags every row with `symbol`
    /// (or the filename stem, uppercased, if `symbol` is `None`).
    pub fn load(path: impl AsRef<Path>, symbol: Option<Symbol>) -> GbResult<Vec<Bar>> {
        let path = path.as_ref();
        let symbol = symbol.unwrap_or_else(|| symbol_from_path(path));

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| GbError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        // Normalize headers to lowercase so "Close"/"CLOSE"/"close" all bind.
        let headers: csv::StringRecord = reader
            .headers()
            .map_err(|e| GbError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
            .iter()
            .map(str::to_lowercase)
            .collect();

        let mut bars = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| GbError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            let row: CsvRow = record
                .deserialize(Some(&headers))
                .map_err(|e| GbError::Validation(format!("malformed CSV row: {e}")))?;
            let timestamp = parse_timestamp(&row.timestamp)?;
            bars.push(Bar::new(
                symbol.clone(),
                timestamp,
                row.open,
                row.high,
                row.low,
                row.close,
                row.volume,
            ));
        }

        bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(bars)
    }

    /// Loads every `*.csv` file directly inside `dir`, one series per file.
    pub fn load_directory(dir: impl AsRef<Path>) -> GbResult<Vec<(Symbol, Vec<Bar>)>> {
        let dir = dir.as_ref();
        let mut series = Vec::new();
        let entries = std::fs::read_dir(dir)?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                let symbol = symbol_from_path(&path);
                let bars = Self::load(&path, Some(symbol.clone()))?;
                series.push((symbol, bars));
            }
        }
        series.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
        Ok(series)
    }
}

fn symbol_from_path(path: &Path) -> Symbol {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN");
    Symbol::new(stem.to_uppercase())
}

/// Reports data-quality issues without failing the load — callers decide
/// whether to abort (used by the CLI to warn before a run).
pub fn validate_bars(bars: &[Bar]) -> Vec<String> {
    let mut issues = Vec::new();
    if bars.is_empty() {
        issues.push("no bars loaded".to_string());
        return issues;
    }

    for (i, bar) in bars.iter().enumerate() {
        if bar.high < bar.low {
            issues.push(format!("row {i}: high < low"));
        }
        if bar.high < bar.open || bar.high < bar.close {
            issues.push(format!("row {i}: high is below open/close"));
        }
        if bar.low > bar.open || bar.low > bar.close {
            issues.push(format!("row {i}: low is above open/close"));
        }
        if bar.volume < Decimal::ZERO {
            issues.push(format!("row {i}: negative volume"));
        }
    }

    for window in bars.windows(2) {
        if window[1].timestamp < window[0].timestamp {
            issues.push("timestamps are not monotonically non-decreasing".to_string());
            break;
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_and_sorts_a_simple_csv() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-03-01 09:31:00,101,102,100,101.5,500").unwrap();
        writeln!(file, "2024-03-01 09:30:00,100,101,99,100.5,1000").unwrap();
        file.flush().unwrap();

        let bars = CsvBarLoader::load(file.path(), Some(Symbol::new("MINI"))).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].close, Decimal::new(1005, 1));
    }

    #[test]
    fn header_matching_is_case_insensitive() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Timestamp,Open,High,Low,Close,Volume").unwrap();
        writeln!(file, "2024-03-01,100,101,99,100.5,1000").unwrap();
        file.flush().unwrap();

        let bars = CsvBarLoader::load(file.path(), Some(Symbol::new("MINI"))).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn validate_bars_flags_inverted_high_low() {
        let bar = Bar::new(
            Symbol::new("MINI"),
            Utc::now(),
            Decimal::from(10),
            Decimal::from(5),
            Decimal::from(20),
            Decimal::from(8),
            Decimal::from(100),
        );
        let issues = validate_bars(&[bar]);
        assert!(!issues.is_empty());
    }
}
