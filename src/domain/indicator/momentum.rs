//! Linear-regression momentum oscillator.
//!
//! basis[i] = ((max(high, n) + min(low, n)) / 2 + mean(close, n)) / 2
//! value[i] = close[i] - basis[i]
//! osc[i]   = endpoint of the least-squares line fitted to value[i-n+1..=i]
//!
//! A window shorter than `n` or containing a missing value yields NaN, so the
//! first valid point is at index 2n-2.

use crate::domain::indicator::{point, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_MOMENTUM_LENGTH: usize = 20;

fn rolling_basis(bars: &[OhlcvBar], length: usize) -> Vec<f64> {
    (0..bars.len())
        .map(|i| {
            if i + 1 < length {
                return f64::NAN;
            }
            let window = &bars[i + 1 - length..=i];
            let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let mean_close = window.iter().map(|b| b.close).sum::<f64>() / length as f64;
            if window.iter().any(|b| b.high.is_nan() || b.low.is_nan()) {
                return f64::NAN;
            }
            ((highest + lowest) / 2.0 + mean_close) / 2.0
        })
        .collect()
}

/// Value of the least-squares line at the last x of the window (x = 0..n-1).
pub fn linreg_endpoint(window: &[f64]) -> f64 {
    let n = window.len();
    if n < 2 || window.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }

    let n_f = n as f64;
    let sum_x = (n_f - 1.0) * n_f / 2.0;
    let sum_xx = (n_f - 1.0) * n_f * (2.0 * n_f - 1.0) / 6.0;
    let sum_y: f64 = window.iter().sum();
    let sum_xy: f64 = window.iter().enumerate().map(|(x, y)| x as f64 * y).sum();

    let denom = n_f * sum_xx - sum_x * sum_x;
    let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n_f;
    intercept + slope * (n_f - 1.0)
}

pub fn calculate_momentum(bars: &[OhlcvBar], length: usize) -> IndicatorSeries {
    if length < 2 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Momentum(length));
    }

    let basis = rolling_basis(bars, length);
    let raw: Vec<f64> = bars.iter().zip(&basis).map(|(b, m)| b.close - m).collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let osc = if i + 1 >= length {
                linreg_endpoint(&raw[i + 1 - length..=i])
            } else {
                f64::NAN
            };
            point(bar.date, true, IndicatorValue::Simple(osc))
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Momentum(length),
        values,
    }
}

/// Bars needed for two consecutive valid oscillator points.
pub fn min_bars_for_delta(length: usize) -> usize {
    2 * length
}
