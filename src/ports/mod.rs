//! Port traits for the I/O the domain depends on.

pub mod config_port;
pub mod data_port;
pub mod macro_port;
pub mod report_port;
pub mod state_port;
