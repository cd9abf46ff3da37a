//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seeded with the first observed value, then
//! EMA[i] = X[i]*k + EMA[i-1]*(1-k). A missing (NaN) input carries the
//! previous average forward.

/// Raw EMA over a value slice. Leading NaNs stay NaN until the first observed value.
pub fn ema_values(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 {
        return vec![f64::NAN; values.len()];
    }

    let k = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = f64::NAN;

    for &x in values {
        if x.is_nan() {
            out.push(ema);
            continue;
        }
        ema = if ema.is_nan() { x } else { x * k + ema * (1.0 - k) };
        out.push(ema);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ema_seeded_by_first_value() {
        let ema = ema_values(&[10.0, 20.0, 30.0], 3);
        assert_relative_eq!(ema[0], 10.0);
        // k = 0.5
        assert_relative_eq!(ema[1], 15.0);
        assert_relative_eq!(ema[2], 22.5);
    }

    #[test]
    fn ema_span_one_tracks_input() {
        let ema = ema_values(&[10.0, 20.0, 30.0], 1);
        assert_eq!(ema, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn ema_nan_carries_previous_value() {
        let ema = ema_values(&[f64::NAN, 10.0, f64::NAN, 30.0], 3);
        assert!(ema[0].is_nan());
        assert_relative_eq!(ema[1], 10.0);
        assert_relative_eq!(ema[2], 10.0);
        assert_relative_eq!(ema[3], 20.0);
    }

    #[test]
    fn ema_equal_prices() {
        let ema = ema_values(&[100.0; 6], 4);
        for v in ema {
            assert_relative_eq!(v, 100.0);
        }
    }
}
