//! Market data port trait.

use crate::domain::error::RegimeError;
use crate::domain::ohlcv::OhlcvBar;

pub trait DataPort {
    /// Daily bars for `ticker`, ascending by date.
    ///
    /// Implementations return an error, never an empty series, when nothing is
    /// available for the ticker.
    fn fetch_daily_ohlcv(&self, ticker: &str) -> Result<Vec<OhlcvBar>, RegimeError>;
}
