//! Per-ticker result rows.

use crate::domain::position::{Action, Position};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const NOTE_SEPARATOR: &str = "; ";

/// `T`/`F` as written in evidence notes.
pub fn flag(value: bool) -> &'static str {
    if value { "T" } else { "F" }
}

/// One row of a run's report. Rows are produced in rule order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalResult {
    pub ticker: String,
    pub entry_timeframe: u32,
    pub entry_pass: bool,
    pub exit_timeframe: u32,
    pub exit_pass: bool,
    pub macro_gate: bool,
    pub prev_position: Position,
    pub new_position: Position,
    pub action: Action,
    pub notes: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl EvalResult {
    pub fn joined_notes(&self) -> String {
        self.notes.join(NOTE_SEPARATOR)
    }
}
