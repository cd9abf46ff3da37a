//! Macroeconomic data port trait.

use crate::domain::error::RegimeError;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePoint {
    pub date: NaiveDate,
    pub value: f64,
}

pub trait MacroPort {
    /// Policy rate observations, ascending by date.
    fn fetch_policy_rate(&self) -> Result<Vec<RatePoint>, RegimeError>;
}
