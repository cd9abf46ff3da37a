//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values
//!
//! A point is `valid` only once its full lookback window is available and all
//! of its components are finite. Everything downstream treats an invalid
//! latest point as "signal not ready".

pub mod ema;
pub mod macd;
pub mod momentum;
pub mod primitives;
pub mod resample;

pub use ema::ema_values;
pub use macd::{calculate_macd, MacdParams};
pub use momentum::{calculate_momentum, DEFAULT_MOMENTUM_LENGTH};
pub use resample::resample_to_k_months;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

impl IndicatorValue {
    fn is_finite(&self) -> bool {
        match self {
            IndicatorValue::Simple(v) => v.is_finite(),
            IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } => line.is_finite() && signal.is_finite() && histogram.is_finite(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Momentum(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        Self {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// The most recent point, if it is valid.
    pub fn latest(&self) -> Option<&IndicatorValue> {
        self.values.last().filter(|p| p.valid).map(|p| &p.value)
    }

    /// The two most recent points as `(previous, latest)`, if both are valid.
    pub fn latest_pair(&self) -> Option<(&IndicatorValue, &IndicatorValue)> {
        match self.values.as_slice() {
            [.., prev, last] if prev.valid && last.valid => Some((&prev.value, &last.value)),
            _ => None,
        }
    }
}

pub(crate) fn point(date: NaiveDate, ready: bool, value: IndicatorValue) -> IndicatorPoint {
    let valid = ready && value.is_finite();
    IndicatorPoint { date, valid, value }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Momentum(length) => write!(f, "MOMENTUM({})", length),
        }
    }
}
