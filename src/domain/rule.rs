//! Ticker rule data structures.
//!
//! - `SignalSpec`: which MACD-derived signal a side tests, and in which direction
//! - `ConfirmSpec`: an extra condition an entry needs on its own timeframe
//! - `GateName`: process-wide conditions an exit can require
//! - `RuleSide`: one side (entry or exit) of a rule
//! - `TickerRule`: the compiled form of one ticker's annotation

use crate::domain::error::RegimeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    MacdState,
    MacdHistDelta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    AboveSignal,
    BelowSignal,
    Increasing,
    Decreasing,
}

/// A (kind, direction) pair. Only four pairs are legal; the rest are kept
/// representable so a bad stored rule fails at evaluation with
/// [`RegimeError::UnsupportedSignal`] instead of vanishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalSpec {
    pub kind: SignalKind,
    pub direction: Direction,
}

impl SignalSpec {
    pub const MACD_ABOVE_SIGNAL: SignalSpec = SignalSpec {
        kind: SignalKind::MacdState,
        direction: Direction::AboveSignal,
    };
    pub const MACD_BELOW_SIGNAL: SignalSpec = SignalSpec {
        kind: SignalKind::MacdState,
        direction: Direction::BelowSignal,
    };
    pub const HIST_INCREASING: SignalSpec = SignalSpec {
        kind: SignalKind::MacdHistDelta,
        direction: Direction::Increasing,
    };
    pub const HIST_DECREASING: SignalSpec = SignalSpec {
        kind: SignalKind::MacdHistDelta,
        direction: Direction::Decreasing,
    };

    pub fn is_legal(&self) -> bool {
        matches!(
            (self.kind, self.direction),
            (SignalKind::MacdState, Direction::AboveSignal | Direction::BelowSignal)
                | (SignalKind::MacdHistDelta, Direction::Increasing | Direction::Decreasing)
        )
    }

    pub fn validate(&self) -> Result<(), RegimeError> {
        if self.is_legal() {
            Ok(())
        } else {
            Err(RegimeError::UnsupportedSignal {
                kind: self.kind.to_string(),
                direction: self.direction.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmKind {
    MomentumDeltaPositive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfirmSpec {
    pub kind: ConfirmKind,
    pub timeframe: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GateName {
    #[serde(rename = "MACRO_GATE_ON")]
    MacroGateOn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSide {
    pub timeframe: u32,
    pub signal: SignalSpec,
    #[serde(default)]
    pub confirms: Vec<ConfirmSpec>,
    #[serde(default)]
    pub gates: BTreeSet<GateName>,
}

impl RuleSide {
    pub fn new(timeframe: u32, signal: SignalSpec) -> Self {
        Self {
            timeframe,
            signal,
            confirms: Vec::new(),
            gates: BTreeSet::new(),
        }
    }

    pub fn default_entry() -> Self {
        Self::new(1, SignalSpec::MACD_ABOVE_SIGNAL)
    }

    pub fn default_exit() -> Self {
        Self::new(1, SignalSpec::MACD_BELOW_SIGNAL)
    }

    pub fn has_gate(&self, gate: GateName) -> bool {
        self.gates.contains(&gate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerRule {
    pub ticker: String,
    pub raw_annotation: String,
    pub entry: RuleSide,
    pub exit: RuleSide,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::MacdState => write!(f, "macd_state"),
            SignalKind::MacdHistDelta => write!(f, "macd_hist_delta"),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AboveSignal => write!(f, "above_signal"),
            Direction::BelowSignal => write!(f, "below_signal"),
            Direction::Increasing => write!(f, "increasing"),
            Direction::Decreasing => write!(f, "decreasing"),
        }
    }
}

impl fmt::Display for ConfirmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmKind::MomentumDeltaPositive => write!(f, "momentum_delta_positive"),
        }
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateName::MacroGateOn => write!(f, "MACRO_GATE_ON"),
        }
    }
}

impl fmt::Display for RuleSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}M {}/{}",
            self.timeframe, self.signal.kind, self.signal.direction
        )?;
        for confirm in &self.confirms {
            write!(f, " +{}({}M)", confirm.kind, confirm.timeframe)?;
        }
        for gate in &self.gates {
            write!(f, " [{}]", gate)?;
        }
        Ok(())
    }
}

impl fmt::Display for TickerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: entry {} | exit {}", self.ticker, self.entry, self.exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_signal_pairs() {
        assert!(SignalSpec::MACD_ABOVE_SIGNAL.is_legal());
        assert!(SignalSpec::MACD_BELOW_SIGNAL.is_legal());
        assert!(SignalSpec::HIST_INCREASING.is_legal());
        assert!(SignalSpec::HIST_DECREASING.is_legal());
    }

    #[test]
    fn illegal_signal_pair_is_rejected() {
        let spec = SignalSpec {
            kind: SignalKind::MacdState,
            direction: Direction::Increasing,
        };
        assert!(!spec.is_legal());
        assert!(matches!(
            spec.validate(),
            Err(RegimeError::UnsupportedSignal { .. })
        ));
        let spec = SignalSpec {
            kind: SignalKind::MacdHistDelta,
            direction: Direction::AboveSignal,
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn default_sides() {
        let entry = RuleSide::default_entry();
        assert_eq!(entry.timeframe, 1);
        assert_eq!(entry.signal, SignalSpec::MACD_ABOVE_SIGNAL);
        assert!(entry.confirms.is_empty());
        assert!(entry.gates.is_empty());
        assert_eq!(RuleSide::default_exit().signal, SignalSpec::MACD_BELOW_SIGNAL);
    }

    #[test]
    fn display_rule() {
        let mut exit = RuleSide::new(1, SignalSpec::HIST_DECREASING);
        exit.gates.insert(GateName::MacroGateOn);
        let mut entry = RuleSide::new(3, SignalSpec::HIST_INCREASING);
        entry.confirms.push(ConfirmSpec {
            kind: ConfirmKind::MomentumDeltaPositive,
            timeframe: 1,
        });
        let rule = TickerRule {
            ticker: "AAA".into(),
            raw_annotation: String::new(),
            entry,
            exit,
        };
        assert_eq!(
            rule.to_string(),
            "AAA: entry 3M macd_hist_delta/increasing +momentum_delta_positive(1M) | exit 1M macd_hist_delta/decreasing [MACRO_GATE_ON]"
        );
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&SignalSpec::MACD_ABOVE_SIGNAL).unwrap();
        assert_eq!(json, r#"{"kind":"macd_state","direction":"above_signal"}"#);
        let gate = serde_json::to_string(&GateName::MacroGateOn).unwrap();
        assert_eq!(gate, r#""MACRO_GATE_ON""#);
    }
}
