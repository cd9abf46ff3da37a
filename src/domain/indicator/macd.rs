//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Readiness: a point is valid once `slow` bars are available.

use crate::domain::indicator::{ema_values, point, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: DEFAULT_FAST,
            slow: DEFAULT_SLOW,
            signal: DEFAULT_SIGNAL,
        }
    }
}

impl MacdParams {
    /// Bars needed before the latest MACD point is trusted.
    pub fn min_bars(&self) -> usize {
        self.fast.max(self.slow)
    }

    pub fn indicator_type(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.fast,
            slow: self.slow,
            signal: self.signal,
        }
    }
}

pub fn calculate_macd(bars: &[OhlcvBar], params: MacdParams) -> IndicatorSeries {
    if bars.is_empty() || params.fast == 0 || params.slow == 0 || params.signal == 0 {
        return IndicatorSeries::empty(params.indicator_type());
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_values(&closes, params.fast);
    let ema_slow = ema_values(&closes, params.slow);

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(fast, slow)| fast - slow)
        .collect();
    let signal_line = ema_values(&macd_line, params.signal);

    let min_bars = params.min_bars();
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let line = macd_line[i];
            let signal = signal_line[i];
            point(
                bar.date,
                i + 1 >= min_bars,
                IndicatorValue::Macd {
                    line,
                    signal,
                    histogram: line - signal,
                },
            )
        })
        .collect();

    IndicatorSeries {
        indicator_type: params.indicator_type(),
        values,
    }
}
