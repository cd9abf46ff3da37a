//! Report output port trait.

use crate::domain::error::RegimeError;
use crate::domain::report::EvalResult;

/// Port for writing the per-run result table.
pub trait ReportPort {
    fn write(&self, rows: &[EvalResult], output_path: &str) -> Result<(), RegimeError>;
}
