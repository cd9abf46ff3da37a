//! Concrete adapter implementations for ports.

pub mod atomic_file;
pub mod csv_adapter;
pub mod csv_report;
pub mod file_config_adapter;
pub mod rule_store;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod state_store;
