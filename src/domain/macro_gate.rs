//! Process-wide macro gate.
//!
//! gate = (broad-market monthly MACD line < signal) AND (latest policy rate
//! change < 0). Computed once per run. Any input failure degrades the gate
//! to `false` and is recorded instead of propagated.

use crate::domain::indicator::primitives::macd_below_signal;
use crate::domain::indicator::{calculate_macd, resample_to_k_months, MacdParams};
use crate::domain::report::flag;
use crate::ports::data_port::DataPort;
use crate::ports::macro_port::{MacroPort, RatePoint};

pub const DEFAULT_INDEX_SYMBOL: &str = "^GSPC";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroGateReading {
    pub gate: bool,
    pub market_macd_below: Option<bool>,
    pub rate_cut_event: Option<bool>,
    pub failures: Vec<String>,
}

impl MacroGateReading {
    pub fn notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if let Some(below) = self.market_macd_below {
            notes.push(format!("market_macd_below={}", flag(below)));
        }
        if let Some(cut) = self.rate_cut_event {
            notes.push(format!("rate_cut_event={}", flag(cut)));
        }
        notes.extend(self.failures.iter().cloned());
        notes
    }
}

/// `rate[-1] - rate[-2] < 0`, or `None` with fewer than two observations.
pub fn rate_cut_event(rates: &[RatePoint]) -> Option<bool> {
    let mut ordered: Vec<&RatePoint> = rates.iter().filter(|r| r.value.is_finite()).collect();
    ordered.sort_by_key(|r| r.date);
    match ordered.as_slice() {
        [.., prev, last] => Some(last.value - prev.value < 0.0),
        _ => None,
    }
}

fn market_macd_below(
    data_port: &dyn DataPort,
    index_symbol: &str,
    macd: MacdParams,
) -> Result<bool, String> {
    let daily = data_port
        .fetch_daily_ohlcv(index_symbol)
        .map_err(|e| format!("market_error={}", e))?;
    let monthly = resample_to_k_months(&daily, 1).map_err(|e| format!("market_error={}", e))?;
    macd_below_signal(&calculate_macd(&monthly, macd))
        .ok_or_else(|| format!("market_macd=not_ready(bars={})", monthly.len()))
}

fn rate_cut(macro_port: &dyn MacroPort) -> Result<bool, String> {
    let rates = macro_port
        .fetch_policy_rate()
        .map_err(|e| format!("rate_error={}", e))?;
    rate_cut_event(&rates).ok_or_else(|| format!("policy_rate=not_ready(points={})", rates.len()))
}

pub fn compute_macro_gate(
    data_port: &dyn DataPort,
    macro_port: &dyn MacroPort,
    index_symbol: &str,
    macd: MacdParams,
) -> MacroGateReading {
    let mut reading = MacroGateReading::default();

    match market_macd_below(data_port, index_symbol, macd) {
        Ok(below) => reading.market_macd_below = Some(below),
        Err(failure) => {
            tracing::warn!(index = index_symbol, %failure, "market leg of macro gate unavailable");
            reading.failures.push(failure);
        }
    }

    match rate_cut(macro_port) {
        Ok(cut) => reading.rate_cut_event = Some(cut),
        Err(failure) => {
            tracing::warn!(%failure, "rate leg of macro gate unavailable");
            reading.failures.push(failure);
        }
    }

    reading.gate = reading.market_macd_below == Some(true) && reading.rate_cut_event == Some(true);
    tracing::info!(
        gate = reading.gate,
        market_macd_below = ?reading.market_macd_below,
        rate_cut_event = ?reading.rate_cut_event,
        "macro gate computed"
    );
    reading
}
