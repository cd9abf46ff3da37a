#![allow(dead_code)]

use chrono::{Datelike, NaiveDate};
pub use regime::domain::ohlcv::OhlcvBar;
use regime::domain::error::RegimeError;
use regime::domain::position::Position;
use regime::ports::data_port::DataPort;
use regime::ports::macro_port::{MacroPort, RatePoint};
use regime::ports::state_port::StatePort;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

pub const INDEX: &str = "^GSPC";

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_daily_ohlcv(&self, ticker: &str) -> Result<Vec<OhlcvBar>, RegimeError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(RegimeError::DataFetch {
                source_name: "mock".to_string(),
                reason: reason.clone(),
            });
        }
        self.data
            .get(ticker)
            .cloned()
            .ok_or_else(|| RegimeError::NoData {
                ticker: ticker.to_string(),
            })
    }
}

pub struct MockMacroPort {
    pub rates: Option<Vec<RatePoint>>,
}

impl MockMacroPort {
    /// Two observations, the second lower than the first.
    pub fn cutting() -> Self {
        Self {
            rates: Some(rates(&[5.5, 5.25])),
        }
    }

    pub fn hiking() -> Self {
        Self {
            rates: Some(rates(&[5.0, 5.25])),
        }
    }

    pub fn unavailable() -> Self {
        Self { rates: None }
    }
}

impl MacroPort for MockMacroPort {
    fn fetch_policy_rate(&self) -> Result<Vec<RatePoint>, RegimeError> {
        self.rates.clone().ok_or_else(|| RegimeError::DataFetch {
            source_name: "mock rates".to_string(),
            reason: "service unavailable".to_string(),
        })
    }
}

/// In-memory state store that records every save.
pub struct MemoryStatePort {
    pub stored: RefCell<BTreeMap<String, String>>,
    pub saves: RefCell<usize>,
    pub fail_load: bool,
    pub fail_save: bool,
}

impl MemoryStatePort {
    pub fn new() -> Self {
        Self {
            stored: RefCell::new(BTreeMap::new()),
            saves: RefCell::new(0),
            fail_load: false,
            fail_save: false,
        }
    }

    pub fn with(mut self, ticker: &str, raw: &str) -> Self {
        self.stored
            .get_mut()
            .insert(ticker.to_string(), raw.to_string());
        self
    }

    pub fn get(&self, ticker: &str) -> Option<String> {
        self.stored.borrow().get(ticker).cloned()
    }
}

impl StatePort for MemoryStatePort {
    fn load(&self) -> Result<BTreeMap<String, String>, RegimeError> {
        if self.fail_load {
            return Err(RegimeError::Database {
                reason: "state store offline".to_string(),
            });
        }
        Ok(self.stored.borrow().clone())
    }

    fn save(&self, positions: &BTreeMap<String, Position>) -> Result<(), RegimeError> {
        if self.fail_save {
            return Err(RegimeError::Database {
                reason: "disk full".to_string(),
            });
        }
        *self.saves.borrow_mut() += 1;
        *self.stored.borrow_mut() = positions
            .iter()
            .map(|(t, p)| (t.clone(), p.as_str().to_string()))
            .collect();
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Daily bars from 2018-01-01 whose price depends only on the calendar month,
/// so every resampling sees a clean monthly trend.
pub fn monthly_trend<F: Fn(usize) -> f64>(days: usize, price: F) -> Vec<OhlcvBar> {
    let start = date(2018, 1, 1);
    (0..days)
        .map(|i| {
            let d = start + chrono::Duration::days(i as i64);
            let month = ((d.year() - 2018) * 12) as usize + d.month0() as usize;
            let p = price(month);
            OhlcvBar {
                date: d,
                open: p,
                high: p * 1.01,
                low: p * 0.99,
                close: p,
                volume: 1_000.0,
            }
        })
        .collect()
}

pub fn uptrend() -> Vec<OhlcvBar> {
    monthly_trend(365 * 6, |m| 100.0 + m as f64)
}

pub fn downtrend() -> Vec<OhlcvBar> {
    monthly_trend(365 * 6, |m| 1000.0 - 5.0 * m as f64)
}

pub fn falling_index() -> Vec<OhlcvBar> {
    monthly_trend(365 * 5, |m| 5000.0 - 20.0 * m as f64)
}

pub fn rising_index() -> Vec<OhlcvBar> {
    monthly_trend(365 * 5, |m| 3000.0 + 20.0 * m as f64)
}

pub fn rates(values: &[f64]) -> Vec<RatePoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| RatePoint {
            date: date(2023, 1, 1) + chrono::Duration::days(i as i64 * 30),
            value,
        })
        .collect()
}

/// Write `bars` as `<dir>/<ticker>.csv` in the layout the CSV adapter reads.
pub fn write_price_csv(dir: &std::path::Path, ticker: &str, bars: &[OhlcvBar]) {
    let mut text = String::from("Date,Open,High,Low,Close,Volume\n");
    for b in bars {
        text.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    std::fs::write(dir.join(format!("{ticker}.csv")), text).unwrap();
}
