//! Signal evaluation.
//!
//! Evaluates a [`TickerRule`] against a daily OHLCV series. Each side is
//! resampled to its own timeframe and tested on the latest completed bar.
//!
//! # Evaluation Semantics
//!
//! - A base signal that is not ready (too few bars) evaluates to `false` and
//!   leaves a `not_ready` note.
//! - Every confirm on the entry side is evaluated and recorded, then ANDed
//!   into the side result.
//! - `MACRO_GATE_ON` on the exit side ANDs the process-wide gate into the exit.
//! - Confirms on the exit side and gates on the entry side are ignored.

use crate::domain::error::RegimeError;
use crate::domain::indicator::momentum::min_bars_for_delta;
use crate::domain::indicator::primitives::{
    hist_delta_decreasing, hist_delta_increasing, macd_above_signal, macd_below_signal,
    momentum_delta_positive,
};
use crate::domain::indicator::{
    calculate_macd, calculate_momentum, resample_to_k_months, IndicatorSeries, MacdParams,
    DEFAULT_MOMENTUM_LENGTH,
};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::report::flag;
use crate::domain::rule::{
    ConfirmKind, ConfirmSpec, Direction, GateName, RuleSide, SignalKind, SignalSpec, TickerRule,
};

type Primitive = fn(&IndicatorSeries) -> Option<bool>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSettings {
    pub macd: MacdParams,
    pub momentum_length: usize,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            macd: MacdParams::default(),
            momentum_length: DEFAULT_MOMENTUM_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideOutcome {
    pub passed: bool,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub entry_pass: bool,
    pub exit_pass: bool,
    pub notes: Vec<String>,
}

fn signal_primitive(signal: SignalSpec) -> Result<Primitive, RegimeError> {
    match (signal.kind, signal.direction) {
        (SignalKind::MacdState, Direction::AboveSignal) => Ok(macd_above_signal),
        (SignalKind::MacdState, Direction::BelowSignal) => Ok(macd_below_signal),
        (SignalKind::MacdHistDelta, Direction::Increasing) => Ok(hist_delta_increasing),
        (SignalKind::MacdHistDelta, Direction::Decreasing) => Ok(hist_delta_decreasing),
        _ => Err(RegimeError::UnsupportedSignal {
            kind: signal.kind.to_string(),
            direction: signal.direction.to_string(),
        }),
    }
}

/// The side's base signal only, without confirms or gates.
fn evaluate_base(
    daily: &[OhlcvBar],
    side: &RuleSide,
    settings: &EvalSettings,
    notes: &mut Vec<String>,
) -> Result<bool, RegimeError> {
    let primitive = signal_primitive(side.signal)?;
    let bars = resample_to_k_months(daily, side.timeframe)?;
    let macd = calculate_macd(&bars, settings.macd);

    match primitive(&macd) {
        Some(passed) => Ok(passed),
        None => {
            tracing::debug!(
                signal = %side.signal.kind,
                timeframe = side.timeframe,
                bars = bars.len(),
                minimum = settings.macd.min_bars(),
                "signal not ready"
            );
            notes.push(format!(
                "{}({}M)=not_ready(bars={})",
                side.signal.kind,
                side.timeframe,
                bars.len()
            ));
            Ok(false)
        }
    }
}

fn evaluate_confirm(
    daily: &[OhlcvBar],
    confirm: &ConfirmSpec,
    settings: &EvalSettings,
    notes: &mut Vec<String>,
) -> Result<bool, RegimeError> {
    let bars = resample_to_k_months(daily, confirm.timeframe)?;
    let series = match confirm.kind {
        ConfirmKind::MomentumDeltaPositive => calculate_momentum(&bars, settings.momentum_length),
    };

    match momentum_delta_positive(&series) {
        Some(passed) => {
            notes.push(format!("{}={}", confirm.kind, flag(passed)));
            Ok(passed)
        }
        None => {
            tracing::debug!(
                confirm = %confirm.kind,
                timeframe = confirm.timeframe,
                bars = bars.len(),
                minimum = min_bars_for_delta(settings.momentum_length),
                "confirm not ready"
            );
            notes.push(format!("{}=not_ready(bars={})", confirm.kind, bars.len()));
            Ok(false)
        }
    }
}

/// Evaluate the base signal of `side` and AND in every confirm it declares.
pub fn evaluate_side(
    daily: &[OhlcvBar],
    side: &RuleSide,
    settings: &EvalSettings,
) -> Result<SideOutcome, RegimeError> {
    let mut notes = Vec::new();
    let mut passed = evaluate_base(daily, side, settings, &mut notes)?;

    for confirm in &side.confirms {
        let confirmed = evaluate_confirm(daily, confirm, settings, &mut notes)?;
        passed = passed && confirmed;
    }

    Ok(SideOutcome { passed, notes })
}

pub fn evaluate_rule(
    daily: &[OhlcvBar],
    rule: &TickerRule,
    macro_gate: bool,
    settings: &EvalSettings,
) -> Result<RuleOutcome, RegimeError> {
    let entry = evaluate_side(daily, &rule.entry, settings)?;
    let mut notes = entry.notes;

    if !rule.exit.confirms.is_empty() {
        tracing::debug!(ticker = %rule.ticker, "ignoring confirms on exit side");
    }
    if !rule.entry.gates.is_empty() {
        tracing::debug!(ticker = %rule.ticker, "ignoring gates on entry side");
    }

    let mut exit_pass = evaluate_base(daily, &rule.exit, settings, &mut notes)?;
    if rule.exit.has_gate(GateName::MacroGateOn) {
        exit_pass = exit_pass && macro_gate;
        notes.push(format!("macro_gate={}", flag(macro_gate)));
    }

    Ok(RuleOutcome {
        entry_pass: entry.passed,
        exit_pass,
        notes,
    })
}
