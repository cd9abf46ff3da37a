//! Run orchestration.
//!
//! load state -> macro gate -> per rule: fetch, evaluate, transition -> save
//! state once -> rows in rule order.
//!
//! Every rule reads its previous position from the snapshot taken at load
//! time, so duplicate tickers do not see each other's updates; the last
//! write wins in the saved state. A ticker whose data or rule config fails
//! is evaluated as `entry_pass = exit_pass = false` and the run continues.

use crate::domain::error::RegimeError;
use crate::domain::macro_gate::{compute_macro_gate, MacroGateReading, DEFAULT_INDEX_SYMBOL};
use crate::domain::position::{transition, Position, PositionBook};
use crate::domain::report::EvalResult;
use crate::domain::rule::{GateName, TickerRule};
use crate::domain::rule_eval::{evaluate_rule, EvalSettings, RuleOutcome};
use crate::ports::data_port::DataPort;
use crate::ports::macro_port::MacroPort;
use crate::ports::state_port::StatePort;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub eval: EvalSettings,
    pub index_symbol: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            eval: EvalSettings::default(),
            index_symbol: DEFAULT_INDEX_SYMBOL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub rows: Vec<EvalResult>,
    pub macro_gate: MacroGateReading,
    pub positions: BTreeMap<String, Position>,
}

fn failed_closed(note: String) -> RuleOutcome {
    RuleOutcome {
        entry_pass: false,
        exit_pass: false,
        notes: vec![note],
    }
}

fn evaluate_ticker(
    rule: &TickerRule,
    data_port: &dyn DataPort,
    gate: &MacroGateReading,
    settings: &RunSettings,
) -> RuleOutcome {
    let daily = match data_port.fetch_daily_ohlcv(&rule.ticker) {
        Ok(daily) => daily,
        Err(e) => {
            tracing::warn!(ticker = %rule.ticker, error = %e, "data fetch failed");
            return failed_closed(format!("data_error={}", e));
        }
    };

    match evaluate_rule(&daily, rule, gate.gate, &settings.eval) {
        Ok(mut outcome) => {
            if rule.exit.has_gate(GateName::MacroGateOn) {
                outcome.notes.extend(gate.notes());
            }
            outcome
        }
        Err(e) if e.is_config_error() => {
            tracing::warn!(ticker = %rule.ticker, error = %e, "rule config rejected");
            failed_closed(format!("config_error={}", e))
        }
        Err(e) => {
            tracing::warn!(ticker = %rule.ticker, error = %e, "evaluation failed");
            failed_closed(format!("data_error={}", e))
        }
    }
}

pub fn run(
    rules: &[TickerRule],
    data_port: &dyn DataPort,
    macro_port: &dyn MacroPort,
    state_port: &dyn StatePort,
    settings: &RunSettings,
    as_of: DateTime<Utc>,
) -> Result<RunOutput, RegimeError> {
    let snapshot = PositionBook::from_raw(state_port.load()?);
    tracing::info!(rules = rules.len(), stored = snapshot.len(), "run started");

    let gate = compute_macro_gate(
        data_port,
        macro_port,
        &settings.index_symbol,
        settings.eval.macd,
    );

    let mut book = snapshot.clone();
    let mut rows = Vec::with_capacity(rules.len());

    for rule in rules {
        let prev = snapshot.get(&rule.ticker);
        let outcome = evaluate_ticker(rule, data_port, &gate, settings);
        let (new, action) = transition(prev, outcome.entry_pass, outcome.exit_pass);
        book.set(&rule.ticker, new);

        tracing::debug!(
            ticker = %rule.ticker,
            entry_pass = outcome.entry_pass,
            exit_pass = outcome.exit_pass,
            %prev,
            %new,
            %action,
            "evaluated"
        );

        rows.push(EvalResult {
            ticker: rule.ticker.clone(),
            entry_timeframe: rule.entry.timeframe,
            entry_pass: outcome.entry_pass,
            exit_timeframe: rule.exit.timeframe,
            exit_pass: outcome.exit_pass,
            macro_gate: gate.gate,
            prev_position: prev,
            new_position: new,
            action,
            notes: outcome.notes,
            timestamp: as_of,
        });
    }

    state_port.save(book.as_map())?;
    tracing::info!(rows = rows.len(), positions = book.len(), "run finished, state saved");

    Ok(RunOutput {
        rows,
        macro_gate: gate,
        positions: book.into_map(),
    })
}
