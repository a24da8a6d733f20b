//! CSV fallback bar provider
//!
//! Reads bar files in the on-disk layout `{SYMBOL}-{SUFFIX}.csv` or
//! `{SYMBOL}_{SUFFIX}.csv`, where the suffix is the upper-cased canonical
//! timeframe. Header columns from heterogenous exporters are renamed
//! through a fixed alias table; rows missing any required numeric value
//! are dropped.

use crate::data::{Bar, Timeframe};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Header aliases resolved to the five canonical columns plus the index.
fn canonical_column(raw: &str) -> Option<&'static str> {
    match raw.trim().to_lowercase().as_str() {
        "datetime" | "date" | "time" | "timestamp" | "ts" | "open_time" | "candle_begin_time" => {
            Some("datetime")
        }
        "open" | "o" | "open_price" => Some("open"),
        "high" | "h" | "high_price" => Some("high"),
        "low" | "l" | "low_price" => Some("low"),
        "close" | "c" | "close_price" | "last" => Some("close"),
        "volume" | "v" | "vol" | "base_volume" | "quote_volume" => Some("volume"),
        _ => None,
    }
}

pub struct CsvBarSource {
    base_path: PathBuf,
}

impl CsvBarSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Candidate file paths for a (symbol, timeframe) pair.
    pub fn candidate_paths(&self, symbol: &str, timeframe: Timeframe) -> [PathBuf; 2] {
        let suffix = timeframe.file_suffix();
        [
            self.base_path.join(format!("{}-{}.csv", symbol, suffix)),
            self.base_path.join(format!("{}_{}.csv", symbol, suffix)),
        ]
    }

    /// Load bars from the first existing candidate file; `None` when no
    /// file exists or the payload is unusable.
    pub fn load(&self, symbol: &str, timeframe: Timeframe) -> Option<Vec<Bar>> {
        let path = self
            .candidate_paths(symbol, timeframe)
            .into_iter()
            .find(|p| p.exists())?;
        match self.parse_file(&path) {
            Ok(bars) if !bars.is_empty() => Some(bars),
            Ok(_) => None,
            Err(e) => {
                warn!("malformed bar file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Symbols present in the data layout, from both filename patterns.
    pub fn list_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::new();
        let entries = match std::fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(_) => return symbols,
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(stem) = name.strip_suffix(".csv") else {
                continue;
            };
            let Some((symbol, suffix)) = stem.rsplit_once(['-', '_']) else {
                continue;
            };
            if Timeframe::parse(suffix).is_ok() && !symbols.iter().any(|s| s == symbol) {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        symbols
    }

    fn parse_file(&self, path: &Path) -> anyhow::Result<Vec<Bar>> {
        let mut rdr = csv::Reader::from_path(path)?;

        // Map canonical column name -> position in this file's header
        let mut positions: HashMap<&'static str, usize> = HashMap::new();
        for (idx, field) in rdr.headers()?.iter().enumerate() {
            if let Some(canonical) = canonical_column(field) {
                positions.entry(canonical).or_insert(idx);
            }
        }
        for required in ["datetime", "open", "high", "low", "close", "volume"] {
            if !positions.contains_key(required) {
                anyhow::bail!("missing required column '{}'", required);
            }
        }

        let mut bars = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let field = |name: &str| record.get(positions[name]).unwrap_or("").trim().to_string();

            let Some(timestamp) = parse_timestamp(&field("datetime")) else {
                continue;
            };
            let numeric = |name: &str| field(name).parse::<f64>().ok();
            let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
                numeric("open"),
                numeric("high"),
                numeric("low"),
                numeric("close"),
                numeric("volume"),
            ) else {
                // Row with any required column missing is dropped
                continue;
            };
            bars.push(Bar::new(timestamp, open, high, low, close, volume));
        }
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

/// Accept epoch millis, epoch seconds, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(epoch) = raw.parse::<i64>() {
        let seconds = if epoch > 10_000_000_000 { epoch / 1000 } else { epoch };
        return Utc.timestamp_opt(seconds, 0).single();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn loads_with_aliased_headers() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "BTC-USDT-4H.csv",
            "Date,O,H,L,C,Vol\n2024-01-01 00:00:00,100,110,95,105,1000\n2024-01-01 04:00:00,105,112,101,108,900\n",
        );
        let source = CsvBarSource::new(dir.path());
        let bars = source.load("BTC-USDT", Timeframe::H4).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[1].close, 108.0);
    }

    #[test]
    fn underscore_pattern_and_epoch_millis() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "ETH-USDT_1D.csv",
            "timestamp,open,high,low,close,volume\n1704067200000,2200,2300,2100,2250,5000\n",
        );
        let source = CsvBarSource::new(dir.path());
        let bars = source.load("ETH-USDT", Timeframe::D1).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 2250.0);
    }

    #[test]
    fn rows_with_missing_values_dropped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "BTC-USDT-1H.csv",
            "datetime,open,high,low,close,volume\n2024-01-01 00:00:00,100,110,95,105,1000\n2024-01-01 01:00:00,,110,95,105,1000\n2024-01-01 02:00:00,101,111,96,106,abc\n",
        );
        let source = CsvBarSource::new(dir.path());
        let bars = source.load("BTC-USDT", Timeframe::H1).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn missing_file_is_absent_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvBarSource::new(dir.path());
        assert!(source.load("NOPE-USDT", Timeframe::H1).is_none());
    }

    #[test]
    fn lists_symbols_from_layout() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "BTC-USDT-4H.csv", "datetime,open,high,low,close,volume\n");
        write_file(dir.path(), "ETH-USDT_1D.csv", "datetime,open,high,low,close,volume\n");
        write_file(dir.path(), "notes.txt", "ignored");
        let source = CsvBarSource::new(dir.path());
        assert_eq!(source.list_symbols(), vec!["BTC-USDT", "ETH-USDT"]);
    }
}
