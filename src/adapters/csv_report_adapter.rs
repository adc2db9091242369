//! CSV result table adapter implementing ReportPort.
//!
//! Column names and order are fixed; absent optional values are written as
//! empty cells.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::error::SimulatorError;
use crate::domain::simulation::{ResultRow, SimulationResult};
use crate::ports::report_port::ReportPort;

pub const COLUMNS: [&str; 11] = [
    "Date",
    "Investment $",
    "Stocks Bought",
    "Stocks",
    "Total Account",
    "Profit/Loss",
    "Principal Invested",
    "Cash",
    "Current Stock",
    "Current State",
    "Trailing Reference",
];

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Write the table to any sink.
    pub fn write_to<W: Write>(&self, result: &SimulationResult, sink: W) -> Result<(), SimulatorError> {
        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(COLUMNS).map_err(report_error)?;
        for row in &result.rows {
            writer.write_record(record(row)).map_err(report_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn report_error(e: csv::Error) -> SimulatorError {
    SimulatorError::Report {
        reason: e.to_string(),
    }
}

fn record(row: &ResultRow) -> [String; 11] {
    [
        row.date.format("%Y-%m-%d").to_string(),
        format!("{:.2}", row.investment_amount),
        format!("{:.6}", row.shares_bought),
        format!("{:.6}", row.shares_held),
        format!("{:.2}", row.portfolio_value),
        format!("{:.2}", row.profit_loss),
        format!("{:.2}", row.principal_invested),
        format!("{:.2}", row.cash),
        row.current_symbol.clone().unwrap_or_default(),
        row.state_label.clone().unwrap_or_default(),
        row.trailing_reference
            .map(|r| format!("{:.2}", r))
            .unwrap_or_default(),
    ]
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &SimulationResult, output_path: &str) -> Result<(), SimulatorError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path).map_err(|e| SimulatorError::Report {
            reason: format!("failed to create {}: {}", path.display(), e),
        })?;
        self.write_to(result, file)
    }
}
