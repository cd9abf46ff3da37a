//! Position state persistence port trait.

use crate::domain::error::RegimeError;
use crate::domain::position::Position;
use std::collections::BTreeMap;

pub trait StatePort {
    /// Stored ticker to position strings, unvalidated. An absent store is an
    /// empty map.
    fn load(&self) -> Result<BTreeMap<String, String>, RegimeError>;

    /// Replace the stored state with `positions` in a single write.
    fn save(&self, positions: &BTreeMap<String, Position>) -> Result<(), RegimeError>;
}
