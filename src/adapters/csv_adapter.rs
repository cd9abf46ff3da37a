//! CSV file adapters for market and macro data.
//!
//! - [`CsvAdapter`]: one `<dir>/<TICKER>.csv` per ticker with
//!   `date,open,high,low,close,volume` columns (header names matched
//!   case-insensitively, extra columns ignored)
//! - [`FredCsvAdapter`]: a FRED-style `DATE,<SERIES>` download; `.` and empty
//!   values are skipped

use crate::domain::error::RegimeError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use crate::ports::macro_port::{MacroPort, RatePoint};
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;

/// Index of the header matching `name`, ignoring case and surrounding spaces.
pub(crate) fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

/// Dates may carry a time suffix (`2024-01-15 00:00:00`); only the day is kept.
pub(crate) fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn fetch_error(source_name: &str, reason: impl Into<String>) -> RegimeError {
    RegimeError::DataFetch {
        source_name: source_name.to_string(),
        reason: reason.into(),
    }
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }
}

fn price(record: &StringRecord, index: usize, ticker: &str, field: &str) -> Result<f64, RegimeError> {
    match record.get(index).map(str::trim) {
        None | Some("") => Ok(f64::NAN),
        Some(raw) => raw
            .parse()
            .map_err(|e| fetch_error(ticker, format!("invalid {} value '{}': {}", field, raw, e))),
    }
}

impl DataPort for CsvAdapter {
    fn fetch_daily_ohlcv(&self, ticker: &str) -> Result<Vec<OhlcvBar>, RegimeError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path)
            .map_err(|e| fetch_error(ticker, format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| fetch_error(ticker, format!("CSV header error: {}", e)))?
            .clone();

        let mut columns = [0usize; 6];
        for (slot, name) in columns
            .iter_mut()
            .zip(["date", "open", "high", "low", "close", "volume"])
        {
            *slot = column_index(&headers, name)
                .ok_or_else(|| fetch_error(ticker, format!("missing {} column", name)))?;
        }
        let [date_col, open_col, high_col, low_col, close_col, volume_col] = columns;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| fetch_error(ticker, format!("CSV parse error: {}", e)))?;

            let date_str = record.get(date_col).unwrap_or_default();
            let date = parse_day(date_str)
                .ok_or_else(|| fetch_error(ticker, format!("invalid date '{}'", date_str)))?;

            bars.push(OhlcvBar {
                date,
                open: price(&record, open_col, ticker, "open")?,
                high: price(&record, high_col, ticker, "high")?,
                low: price(&record, low_col, ticker, "low")?,
                close: price(&record, close_col, ticker, "close")?,
                volume: price(&record, volume_col, ticker, "volume")?,
            });
        }

        if bars.is_empty() {
            return Err(RegimeError::NoData {
                ticker: ticker.to_string(),
            });
        }

        bars.sort_by_key(|b| b.date);
        tracing::debug!(ticker, bars = bars.len(), path = %path.display(), "loaded daily bars");
        Ok(bars)
    }
}

pub struct FredCsvAdapter {
    path: PathBuf,
}

impl FredCsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl MacroPort for FredCsvAdapter {
    fn fetch_policy_rate(&self) -> Result<Vec<RatePoint>, RegimeError> {
        const SOURCE: &str = "policy_rate";

        let content = fs::read_to_string(&self.path).map_err(|e| {
            fetch_error(SOURCE, format!("failed to read {}: {}", self.path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut points = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| fetch_error(SOURCE, format!("CSV parse error: {}", e)))?;
            let (Some(date_str), Some(value_str)) = (record.get(0), record.get(1)) else {
                continue;
            };

            let value_str = value_str.trim();
            if value_str.is_empty() || value_str == "." {
                continue;
            }

            let date = parse_day(date_str)
                .ok_or_else(|| fetch_error(SOURCE, format!("invalid date '{}'", date_str)))?;
            let value: f64 = value_str
                .parse()
                .map_err(|e| fetch_error(SOURCE, format!("invalid rate '{}': {}", value_str, e)))?;
            points.push(RatePoint { date, value });
        }

        if points.is_empty() {
            return Err(RegimeError::NoData {
                ticker: SOURCE.to_string(),
            });
        }

        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "Date,Open,High,Low,Close,Adj Close,Volume\n\
            2024-01-17,110.0,120.0,105.0,115.0,115.0,55000\n\
            2024-01-15,100.0,110.0,90.0,105.0,105.0,50000\n\
            2024-01-16 00:00:00,105.0,115.0,100.0,,110.0,60000\n";

        fs::write(path.join("BHP.csv"), csv_content).unwrap();
        fs::write(path.join("CBA.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("BAD.csv"), "date,open,high,low\n2024-01-15,1,2,3\n").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_returns_sorted_bars() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_daily_ohlcv("BHP").unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000.0);
        assert!(bars[1].close.is_nan());
        assert_eq!(bars[2].date, NaiveDate::from_ymd_opt(2024, 1, 17).unwrap());
    }

    #[test]
    fn missing_file_is_fetch_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter.fetch_daily_ohlcv("XYZ").unwrap_err();
        assert!(matches!(err, RegimeError::DataFetch { source_name, .. } if source_name == "XYZ"));
    }

    #[test]
    fn header_only_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_daily_ohlcv("CBA"),
            Err(RegimeError::NoData { .. })
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter.fetch_daily_ohlcv("BAD").unwrap_err();
        assert!(err.to_string().contains("missing close column"));
    }

    #[test]
    fn fred_rates_skip_missing_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("DFEDTARU.csv");
        fs::write(
            &path,
            "DATE,DFEDTARU\n2024-09-17,5.50\n2024-09-18,.\n2024-09-19,5.00\n2024-09-20,\n",
        )
        .unwrap();

        let rates = FredCsvAdapter::new(path).fetch_policy_rate().unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].value, 5.5);
        assert_eq!(rates[1].value, 5.0);
        assert_eq!(rates[1].date, NaiveDate::from_ymd_opt(2024, 9, 19).unwrap());
    }

    #[test]
    fn fred_missing_file_is_fetch_error() {
        let adapter = FredCsvAdapter::new(PathBuf::from("/nonexistent/rates.csv"));
        assert!(matches!(
            adapter.fetch_policy_rate(),
            Err(RegimeError::DataFetch { .. })
        ));
    }
}
