//! Calendar resampling of daily bars into k-month bars.
//!
//! Daily bars are first folded into calendar-month bars
//! (open: first, high: max, low: min, close: last, volume: sum; missing values
//! skipped), months without a close are dropped, and the months are then
//! grouped into buckets of `k` by `floor(month_ordinal / k)` and folded again
//! with the same rule. A bucket is stamped with the date of its last month.

use crate::domain::error::RegimeError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

pub const MAX_MONTHS: u32 = 12;

#[derive(Debug, Default)]
struct Fold {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: f64,
    date: Option<NaiveDate>,
}

impl Fold {
    fn push(&mut self, bar: &OhlcvBar, date: NaiveDate) {
        if self.open.is_none() && !bar.open.is_nan() {
            self.open = Some(bar.open);
        }
        if !bar.high.is_nan() {
            self.high = Some(self.high.map_or(bar.high, |h| h.max(bar.high)));
        }
        if !bar.low.is_nan() {
            self.low = Some(self.low.map_or(bar.low, |l| l.min(bar.low)));
        }
        if !bar.close.is_nan() {
            self.close = Some(bar.close);
        }
        if !bar.volume.is_nan() {
            self.volume += bar.volume;
        }
        self.date = Some(date);
    }

    fn finish(self) -> Option<OhlcvBar> {
        let close = self.close?;
        Some(OhlcvBar {
            date: self.date?,
            open: self.open.unwrap_or(f64::NAN),
            high: self.high.unwrap_or(f64::NAN),
            low: self.low.unwrap_or(f64::NAN),
            close,
            volume: self.volume,
        })
    }
}

fn month_ordinal(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Fold bars sharing a key, in date order. Folds without a close are dropped.
fn fold_by<F>(bars: &[OhlcvBar], key: F, stamp: fn(NaiveDate) -> NaiveDate) -> Vec<OhlcvBar>
where
    F: Fn(NaiveDate) -> i64,
{
    let mut ordered: Vec<&OhlcvBar> = bars.iter().collect();
    ordered.sort_by_key(|b| b.date);

    let mut folds: BTreeMap<i64, Fold> = BTreeMap::new();
    for bar in ordered {
        folds
            .entry(key(bar.date))
            .or_default()
            .push(bar, stamp(bar.date));
    }

    folds.into_values().filter_map(Fold::finish).collect()
}

pub fn validate_months(months: u32) -> Result<u32, RegimeError> {
    if (1..=MAX_MONTHS).contains(&months) {
        Ok(months)
    } else {
        Err(RegimeError::InvalidTimeframe { months })
    }
}

pub fn resample_to_k_months(daily: &[OhlcvBar], k: u32) -> Result<Vec<OhlcvBar>, RegimeError> {
    let k = validate_months(k)? as i64;

    let monthly = fold_by(daily, month_ordinal, month_start);
    if k == 1 {
        return Ok(monthly);
    }

    Ok(fold_by(&monthly, |d| month_ordinal(d).div_euclid(k), |d| d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> OhlcvBar {
        OhlcvBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn daily_series(start: NaiveDate, days: usize) -> Vec<OhlcvBar> {
        (0..days)
            .map(|i| {
                let p = 100.0 + i as f64;
                bar(
                    start + chrono::Duration::days(i as i64),
                    p,
                    p + 1.0,
                    p - 1.0,
                    p,
                    10.0,
                )
            })
            .collect()
    }

    #[test]
    fn monthly_aggregation_rules() {
        let bars = vec![
            bar(date(2024, 1, 2), 10.0, 12.0, 9.0, 11.0, 100.0),
            bar(date(2024, 1, 15), 11.0, 15.0, 8.0, 14.0, 200.0),
            bar(date(2024, 1, 31), 14.0, 14.5, 13.0, 13.5, 300.0),
            bar(date(2024, 2, 1), 13.5, 16.0, 13.0, 15.0, 50.0),
        ];
        let monthly = resample_to_k_months(&bars, 1).unwrap();

        assert_eq!(monthly.len(), 2);
        let jan = &monthly[0];
        assert_eq!(jan.date, date(2024, 1, 1));
        assert_relative_eq!(jan.open, 10.0);
        assert_relative_eq!(jan.high, 15.0);
        assert_relative_eq!(jan.low, 8.0);
        assert_relative_eq!(jan.close, 13.5);
        assert_relative_eq!(jan.volume, 600.0);
        assert_eq!(monthly[1].date, date(2024, 2, 1));
    }

    #[test]
    fn month_without_close_is_dropped() {
        let bars = vec![
            bar(date(2024, 1, 2), 10.0, 12.0, 9.0, 11.0, 100.0),
            bar(date(2024, 2, 2), 10.0, 12.0, 9.0, f64::NAN, 100.0),
            bar(date(2024, 3, 2), 10.0, 12.0, 9.0, 12.0, 100.0),
        ];
        let monthly = resample_to_k_months(&bars, 1).unwrap();
        let dates: Vec<_> = monthly.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 3, 1)]);
    }

    #[test]
    fn missing_close_inside_month_uses_last_observed() {
        let bars = vec![
            bar(date(2024, 1, 2), 10.0, 12.0, 9.0, 11.0, 100.0),
            bar(date(2024, 1, 3), 10.0, 12.0, 9.0, f64::NAN, 100.0),
        ];
        let monthly = resample_to_k_months(&bars, 1).unwrap();
        assert_relative_eq!(monthly[0].close, 11.0);
    }

    #[test]
    fn unsorted_input_is_ordered_by_date() {
        let bars = vec![
            bar(date(2024, 1, 20), 20.0, 21.0, 19.0, 20.5, 1.0),
            bar(date(2024, 1, 5), 10.0, 11.0, 9.0, 10.5, 1.0),
        ];
        let monthly = resample_to_k_months(&bars, 1).unwrap();
        assert_relative_eq!(monthly[0].open, 10.0);
        assert_relative_eq!(monthly[0].close, 20.5);
    }

    #[test]
    fn quarterly_buckets_follow_month_ordinal() {
        // ordinal(2024-01) = 2024*12 + 0 = 24288, divisible by 3.
        let monthly: Vec<OhlcvBar> = (1..=7)
            .map(|m| bar(date(2024, m, 10), m as f64, m as f64 + 1.0, m as f64 - 1.0, m as f64, 1.0))
            .collect();
        let q = resample_to_k_months(&monthly, 3).unwrap();

        assert_eq!(q.len(), 3);
        assert_eq!(q[0].date, date(2024, 3, 1));
        assert_relative_eq!(q[0].open, 1.0);
        assert_relative_eq!(q[0].high, 4.0);
        assert_relative_eq!(q[0].low, 0.0);
        assert_relative_eq!(q[0].close, 3.0);
        assert_relative_eq!(q[0].volume, 3.0);
        assert_eq!(q[1].date, date(2024, 6, 1));
        // Partial trailing bucket holds only July.
        assert_eq!(q[2].date, date(2024, 7, 1));
        assert_relative_eq!(q[2].close, 7.0);
    }

    #[test]
    fn k_one_matches_monthly_bars() {
        let daily = daily_series(date(2023, 1, 1), 120);
        let one = resample_to_k_months(&daily, 1).unwrap();
        assert_eq!(one.len(), 4);
        assert_eq!(one[3].date, date(2023, 4, 1));
    }

    #[test]
    fn invalid_k_is_rejected() {
        let daily = daily_series(date(2023, 1, 1), 10);
        assert!(matches!(
            resample_to_k_months(&daily, 0),
            Err(RegimeError::InvalidTimeframe { months: 0 })
        ));
        assert!(matches!(
            resample_to_k_months(&daily, 13),
            Err(RegimeError::InvalidTimeframe { months: 13 })
        ));
    }

    #[test]
    fn empty_input_yields_no_bars() {
        assert!(resample_to_k_months(&[], 6).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn timestamps_strictly_increase(k in 1u32..=12, days in 1usize..1500, offset in 0i64..3650) {
            let start = date(2000, 1, 1) + chrono::Duration::days(offset);
            let bars = resample_to_k_months(&daily_series(start, days), k).unwrap();
            prop_assert!(!bars.is_empty());
            for pair in bars.windows(2) {
                prop_assert!(pair[0].date < pair[1].date);
                prop_assert!(
                    month_ordinal(pair[0].date).div_euclid(k as i64)
                        < month_ordinal(pair[1].date).div_euclid(k as i64)
                );
            }
        }
    }
}
