//! Latest-bar signal primitives.
//!
//! Each primitive looks only at the most recent completed bar (and the one
//! before it for deltas). `None` means the underlying series is not ready.

use crate::domain::indicator::{IndicatorSeries, IndicatorValue};

fn latest_macd(series: &IndicatorSeries) -> Option<(f64, f64)> {
    match series.latest()? {
        IndicatorValue::Macd { line, signal, .. } => Some((*line, *signal)),
        IndicatorValue::Simple(_) => None,
    }
}

fn histogram_delta(series: &IndicatorSeries) -> Option<f64> {
    match series.latest_pair()? {
        (
            IndicatorValue::Macd { histogram: prev, .. },
            IndicatorValue::Macd { histogram: last, .. },
        ) => Some(last - prev),
        _ => None,
    }
}

fn simple_delta(series: &IndicatorSeries) -> Option<f64> {
    match series.latest_pair()? {
        (IndicatorValue::Simple(prev), IndicatorValue::Simple(last)) => Some(last - prev),
        _ => None,
    }
}

pub fn macd_above_signal(macd: &IndicatorSeries) -> Option<bool> {
    latest_macd(macd).map(|(line, signal)| line > signal)
}

pub fn macd_below_signal(macd: &IndicatorSeries) -> Option<bool> {
    latest_macd(macd).map(|(line, signal)| line < signal)
}

pub fn hist_delta_increasing(macd: &IndicatorSeries) -> Option<bool> {
    histogram_delta(macd).map(|d| d > 0.0)
}

pub fn hist_delta_decreasing(macd: &IndicatorSeries) -> Option<bool> {
    histogram_delta(macd).map(|d| d < 0.0)
}

pub fn momentum_delta_positive(momentum: &IndicatorSeries) -> Option<bool> {
    simple_delta(momentum).map(|d| d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{point, IndicatorType};
    use chrono::NaiveDate;

    fn macd_series(points: &[(bool, f64, f64)]) -> IndicatorSeries {
        IndicatorSeries {
            indicator_type: IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9,
            },
            values: points
                .iter()
                .enumerate()
                .map(|(i, &(ready, line, signal))| {
                    point(
                        NaiveDate::from_ymd_opt(2024, 1, i as u32 + 1).unwrap(),
                        ready,
                        IndicatorValue::Macd {
                            line,
                            signal,
                            histogram: line - signal,
                        },
                    )
                })
                .collect(),
        }
    }

    fn simple_series(points: &[(bool, f64)]) -> IndicatorSeries {
        IndicatorSeries {
            indicator_type: IndicatorType::Momentum(20),
            values: points
                .iter()
                .enumerate()
                .map(|(i, &(ready, v))| {
                    point(
                        NaiveDate::from_ymd_opt(2024, 1, i as u32 + 1).unwrap(),
                        ready,
                        IndicatorValue::Simple(v),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn above_and_below_signal() {
        let s = macd_series(&[(true, 1.0, 2.0), (true, 3.0, 2.0)]);
        assert_eq!(macd_above_signal(&s), Some(true));
        assert_eq!(macd_below_signal(&s), Some(false));
    }

    #[test]
    fn equal_line_and_signal_is_neither() {
        let s = macd_series(&[(true, 2.0, 2.0)]);
        assert_eq!(macd_above_signal(&s), Some(false));
        assert_eq!(macd_below_signal(&s), Some(false));
    }

    #[test]
    fn histogram_delta_direction() {
        // histograms: -1, +1
        let s = macd_series(&[(true, 1.0, 2.0), (true, 3.0, 2.0)]);
        assert_eq!(hist_delta_increasing(&s), Some(true));
        assert_eq!(hist_delta_decreasing(&s), Some(false));
    }

    #[test]
    fn not_ready_series_yield_none() {
        let s = macd_series(&[(false, 1.0, 2.0), (true, 3.0, 2.0)]);
        assert_eq!(macd_above_signal(&s), Some(true));
        assert_eq!(hist_delta_increasing(&s), None);

        let s = macd_series(&[(true, 1.0, 2.0), (false, 3.0, 2.0)]);
        assert_eq!(macd_above_signal(&s), None);

        assert_eq!(macd_above_signal(&macd_series(&[])), None);
    }

    #[test]
    fn momentum_delta() {
        assert_eq!(
            momentum_delta_positive(&simple_series(&[(true, 1.0), (true, 2.0)])),
            Some(true)
        );
        assert_eq!(
            momentum_delta_positive(&simple_series(&[(true, 2.0), (true, 2.0)])),
            Some(false)
        );
        assert_eq!(
            momentum_delta_positive(&simple_series(&[(true, 1.0), (true, f64::NAN)])),
            None
        );
    }

    #[test]
    fn wrong_series_shape_is_not_ready() {
        let s = simple_series(&[(true, 1.0), (true, 2.0)]);
        assert_eq!(macd_above_signal(&s), None);
        assert_eq!(hist_delta_increasing(&s), None);
    }
}
