//! Report output: CSV file and markdown table.

use crate::adapters::atomic_file::write_atomic;
use crate::domain::error::RegimeError;
use crate::domain::report::EvalResult;
use crate::ports::report_port::ReportPort;
use std::fmt::Write as _;
use std::path::Path;

pub const COLUMNS: [&str; 11] = [
    "Ticker",
    "EntryTF",
    "EntryPass",
    "ExitTF",
    "ExitPass",
    "MacroGate",
    "PrevPos",
    "NewPos",
    "Action",
    "Notes",
    "UpdatedAt",
];

fn cells(row: &EvalResult) -> [String; 11] {
    [
        row.ticker.clone(),
        format!("{}M", row.entry_timeframe),
        row.entry_pass.to_string(),
        format!("{}M", row.exit_timeframe),
        row.exit_pass.to_string(),
        row.macro_gate.to_string(),
        row.prev_position.to_string(),
        row.new_position.to_string(),
        row.action.to_string(),
        row.joined_notes(),
        row.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    ]
}

pub fn render_csv(rows: &[EvalResult]) -> Result<String, RegimeError> {
    let codec_error = |e: &dyn std::fmt::Display| RegimeError::Codec {
        format: "csv report".to_string(),
        reason: e.to_string(),
    };

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(COLUMNS).map_err(|e| codec_error(&e))?;
    for row in rows {
        wtr.write_record(cells(row)).map_err(|e| codec_error(&e))?;
    }
    let bytes = wtr.into_inner().map_err(|e| codec_error(&e))?;
    String::from_utf8(bytes).map_err(|e| codec_error(&e))
}

/// A GitHub-style markdown table of the rows.
pub fn render_markdown(rows: &[EvalResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "| {} |", COLUMNS.join(" | "));
    let _ = writeln!(out, "|{}", "---|".repeat(COLUMNS.len()));
    for row in rows {
        let escaped: Vec<String> = cells(row).iter().map(|c| c.replace('|', "\\|")).collect();
        let _ = writeln!(out, "| {} |", escaped.join(" | "));
    }
    out
}

pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(&self, rows: &[EvalResult], output_path: &str) -> Result<(), RegimeError> {
        write_atomic(Path::new(output_path), &render_csv(rows)?)?;
        tracing::info!(path = output_path, rows = rows.len(), "report written");
        Ok(())
    }
}
