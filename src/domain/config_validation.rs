//! Configuration loading and validation.
//!
//! Everything here runs before any data is touched; a failure means the
//! simulation never starts.

use std::collections::HashSet;

use crate::domain::error::SimulatorError;
use crate::domain::simulation::SimulationConfig;
use crate::domain::strategy::{build_strategy_from_config, Strategy};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const SIMULATION_SECTION: &str = "simulation";

/// Validate request fields shared by every strategy against `today`.
pub fn validate_simulation_config(
    config: &SimulationConfig,
    requires_symbol_list: bool,
    today: NaiveDate,
) -> Result<(), SimulatorError> {
    validate_symbols(&config.symbols, requires_symbol_list)?;
    validate_dates(config.start_date, config.end_date, today)?;
    validate_daily_investment(config.daily_investment)?;
    Ok(())
}

fn validate_symbols(symbols: &[String], requires_symbol_list: bool) -> Result<(), SimulatorError> {
    if symbols.is_empty() {
        return Err(SimulatorError::missing(SIMULATION_SECTION, "symbols"));
    }
    if symbols.iter().any(|s| s.trim().is_empty()) {
        return Err(SimulatorError::invalid(
            SIMULATION_SECTION,
            "symbols",
            "symbol list contains an empty entry",
        ));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = symbols.iter().find(|s| !seen.insert(s.as_str())) {
        return Err(SimulatorError::invalid(
            SIMULATION_SECTION,
            "symbols",
            format!("duplicate symbol {dup}"),
        ));
    }
    if !requires_symbol_list && symbols.len() != 1 {
        return Err(SimulatorError::invalid(
            SIMULATION_SECTION,
            "symbols",
            "this strategy takes exactly one symbol",
        ));
    }
    Ok(())
}

fn validate_dates(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<(), SimulatorError> {
    if start > end {
        return Err(SimulatorError::invalid(
            SIMULATION_SECTION,
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    if end > today {
        return Err(SimulatorError::invalid(
            SIMULATION_SECTION,
            "end_date",
            format!("end_date {end} is in the future (today is {today})"),
        ));
    }
    Ok(())
}

fn validate_daily_investment(amount: f64) -> Result<(), SimulatorError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(SimulatorError::invalid(
            SIMULATION_SECTION,
            "daily_investment",
            "daily_investment must be positive",
        ));
    }
    Ok(())
}

/// Split a comma-separated symbol list, trimming and upper-casing entries.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Read `[simulation]` into a `SimulationConfig`. Range checks are left to
/// `validate_simulation_config`.
pub fn load_simulation_config(config: &dyn ConfigPort) -> Result<SimulationConfig, SimulatorError> {
    let symbols = config
        .get_string(SIMULATION_SECTION, "symbols")
        .map(|raw| parse_symbols(&raw))
        .unwrap_or_default();

    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    let raw_amount = config
        .get_string(SIMULATION_SECTION, "daily_investment")
        .ok_or_else(|| SimulatorError::missing(SIMULATION_SECTION, "daily_investment"))?;
    let daily_investment: f64 = raw_amount.trim().parse().map_err(|_| {
        SimulatorError::invalid(SIMULATION_SECTION, "daily_investment", "not a number")
    })?;

    Ok(SimulationConfig {
        symbols,
        start_date,
        end_date,
        daily_investment,
    })
}

fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, SimulatorError> {
    match config.get_string(SIMULATION_SECTION, field) {
        None => Err(SimulatorError::missing(SIMULATION_SECTION, field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            SimulatorError::invalid(
                SIMULATION_SECTION,
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

/// Strategy id from `[simulation] strategy`, unless overridden.
pub fn strategy_id(config: &dyn ConfigPort, id_override: Option<&str>) -> Result<String, SimulatorError> {
    match id_override {
        Some(id) => Ok(id.trim().to_string()),
        None => config
            .get_string(SIMULATION_SECTION, "strategy")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SimulatorError::missing(SIMULATION_SECTION, "strategy")),
    }
}

/// Full pre-flight check: strategy, its parameters and the shared fields.
pub fn validate_config(
    config: &dyn ConfigPort,
    id_override: Option<&str>,
    today: NaiveDate,
) -> Result<(Box<dyn Strategy>, SimulationConfig), SimulatorError> {
    let id = strategy_id(config, id_override)?;
    let strategy = build_strategy_from_config(&id, config)?;
    let simulation = load_simulation_config(config)?;
    validate_simulation_config(&simulation, strategy.requires_symbol_list(), today)?;
    Ok((strategy, simulation))
}
