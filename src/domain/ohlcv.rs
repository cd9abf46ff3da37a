//! OHLCV bar representation.

use chrono::NaiveDate;

/// One price bar. Daily bars come from a data provider; resampled bars carry
/// the first day of their (last) month as `date`.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}
