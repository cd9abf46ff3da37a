//! Position state machine.
//!
//! `transition` maps (previous position, entry pass, exit pass) to the new
//! position and the action label. Exit dominates entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "IN")]
    In,
    #[default]
    #[serde(rename = "OUT")]
    Out,
}

impl Position {
    /// Parse a persisted value. Surrounding whitespace and case are ignored.
    pub fn parse_stored(raw: &str) -> Option<Position> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "IN" => Some(Position::In),
            "OUT" => Some(Position::Out),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::In => "IN",
            Position::Out => "OUT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
    Wait,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
            Action::Wait => "WAIT",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn action_for(prev: Position, new: Position) -> Action {
    match (prev, new) {
        (Position::Out, Position::In) => Action::Buy,
        (Position::In, Position::Out) => Action::Sell,
        (Position::In, Position::In) => Action::Hold,
        (Position::Out, Position::Out) => Action::Wait,
    }
}

pub fn transition(prev: Position, entry_pass: bool, exit_pass: bool) -> (Position, Action) {
    let new = if exit_pass {
        Position::Out
    } else if prev == Position::Out && entry_pass {
        Position::In
    } else {
        prev
    };
    (new, action_for(prev, new))
}

/// Per-ticker positions for one run. Unknown tickers read as `OUT`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionBook {
    positions: BTreeMap<String, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted raw values, normalizing anything unrecognized to `OUT`.
    pub fn from_raw(raw: BTreeMap<String, String>) -> Self {
        let positions = raw
            .into_iter()
            .map(|(ticker, value)| {
                let position = Position::parse_stored(&value).unwrap_or_else(|| {
                    tracing::warn!(
                        ticker = %ticker,
                        value = %value,
                        "unrecognized stored position, treating as OUT"
                    );
                    Position::Out
                });
                (ticker, position)
            })
            .collect();
        Self { positions }
    }

    pub fn get(&self, ticker: &str) -> Position {
        self.positions.get(ticker).copied().unwrap_or_default()
    }

    pub fn set(&mut self, ticker: &str, position: Position) {
        self.positions.insert(ticker.to_string(), position);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn into_map(self) -> BTreeMap<String, Position> {
        self.positions
    }
}

impl From<BTreeMap<String, Position>> for PositionBook {
    fn from(positions: BTreeMap<String, Position>) -> Self {
        Self { positions }
    }
}
