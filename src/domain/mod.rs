//! Core domain types and logic.

pub mod config_validation;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod macro_gate;
pub mod ohlcv;
pub mod position;
pub mod report;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
