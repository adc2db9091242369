//! Simulation driver: coverage, preload, strategy replay, result table.
//!
//! A run validates its configuration, asks the repository to cover the
//! window plus the strategy's indicator lookback, loads every symbol once,
//! and hands the indexed history to the strategy state machine. Independent
//! runs share nothing mutable and are executed in parallel by `run_batch`.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::config_validation::validate_simulation_config;
use crate::domain::error::SimulatorError;
use crate::domain::portfolio::{Fill, Portfolio};
use crate::domain::price_history::{PriceHistory, SymbolHistory};
use crate::domain::strategy::{build_strategy, ParameterValues, Strategy};
use crate::ports::data_port::DataPort;

/// Request fields shared by every strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// One symbol, or the rotation candidate list in preference order.
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    /// Inclusive.
    pub end_date: NaiveDate,
    pub daily_investment: f64,
}

#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub strategy_id: String,
    pub params: ParameterValues,
    pub config: SimulationConfig,
}

/// One trading day of the ledger. Currency fields are rounded to cents,
/// share counts to six decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub date: NaiveDate,
    /// New principal contributed this day.
    pub investment_amount: f64,
    pub shares_bought: f64,
    pub shares_held: f64,
    pub portfolio_value: f64,
    pub profit_loss: f64,
    pub principal_invested: f64,
    pub cash: f64,
    pub current_symbol: Option<String>,
    pub state_label: Option<String>,
    pub trailing_reference: Option<f64>,
}

impl ResultRow {
    /// Row for `date` from the ledger after the day's actions, marked at
    /// `prices`.
    pub fn snapshot(
        date: NaiveDate,
        portfolio: &Portfolio,
        prices: &HashMap<String, f64>,
        fill: &Fill,
    ) -> Self {
        let value = portfolio.mark_to_market(prices);
        ResultRow {
            date,
            investment_amount: round_currency(fill.contributed),
            shares_bought: round_shares(fill.shares),
            shares_held: round_shares(portfolio.total_shares()),
            portfolio_value: round_currency(value),
            profit_loss: round_currency(value - portfolio.principal_invested),
            principal_invested: round_currency(portfolio.principal_invested),
            cash: round_currency(portfolio.cash),
            current_symbol: None,
            state_label: None,
            trailing_reference: None,
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.current_symbol = Some(symbol.to_string());
        self
    }

    pub fn with_state(mut self, label: impl Into<String>) -> Self {
        self.state_label = Some(label.into());
        self
    }

    pub fn with_trailing_reference(mut self, reference: f64) -> Self {
        self.trailing_reference = Some(round_currency(reference));
        self
    }
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub strategy_id: String,
    pub strategy_name: String,
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rows: Vec<ResultRow>,
}

impl SimulationResult {
    pub fn final_row(&self) -> Option<&ResultRow> {
        self.rows.last()
    }

    pub fn principal_invested(&self) -> f64 {
        self.final_row().map_or(0.0, |r| r.principal_invested)
    }

    pub fn portfolio_value(&self) -> f64 {
        self.final_row().map_or(0.0, |r| r.portfolio_value)
    }

    pub fn profit_loss(&self) -> f64 {
        self.final_row().map_or(0.0, |r| r.profit_loss)
    }

    /// Profit as a percentage of principal; zero when nothing was invested.
    pub fn return_pct(&self) -> f64 {
        let principal = self.principal_invested();
        if principal > 0.0 {
            self.profit_loss() / principal * 100.0
        } else {
            0.0
        }
    }
}

pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round_shares(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Build the requested strategy and run it.
pub fn run(
    data_port: &dyn DataPort,
    request: &SimulationRequest,
) -> Result<SimulationResult, SimulatorError> {
    let strategy = build_strategy(&request.strategy_id, &request.params)?;
    run_strategy(data_port, strategy.as_ref(), &request.config)
}

pub fn run_strategy(
    data_port: &dyn DataPort,
    strategy: &dyn Strategy,
    config: &SimulationConfig,
) -> Result<SimulationResult, SimulatorError> {
    validate_simulation_config(config, strategy.requires_symbol_list(), data_port.today())?;

    info!(
        strategy = strategy.id(),
        symbols = ?config.symbols,
        start = %config.start_date,
        end = %config.end_date,
        daily_investment = config.daily_investment,
        "starting simulation"
    );

    let history = load_history(data_port, config, strategy.lookback_days())?;
    let rows = strategy.simulate(&history, config)?;

    if rows.is_empty() {
        return Err(SimulatorError::DataUnavailable {
            symbol: config.symbols.join(","),
            start: config.start_date,
            end: config.end_date,
        });
    }

    let result = SimulationResult {
        strategy_id: strategy.id().to_string(),
        strategy_name: strategy.name().to_string(),
        symbols: config.symbols.clone(),
        start_date: config.start_date,
        end_date: config.end_date,
        rows,
    };
    info!(
        strategy = strategy.id(),
        rows = result.rows.len(),
        principal = result.principal_invested(),
        profit_loss = result.profit_loss(),
        "simulation complete"
    );
    Ok(result)
}

/// Cover and load every symbol from `start - lookback_days` to `end`.
///
/// A symbol with no bars inside the visible window is a data error, even
/// when lookback bars exist.
pub fn load_history(
    data_port: &dyn DataPort,
    config: &SimulationConfig,
    lookback_days: i64,
) -> Result<PriceHistory, SimulatorError> {
    let load_start = config.start_date - Duration::days(lookback_days.max(0));
    let mut histories = Vec::with_capacity(config.symbols.len());

    for symbol in &config.symbols {
        data_port.ensure_coverage(symbol, load_start, config.end_date)?;
        let bars = data_port.get_bars(symbol, load_start, config.end_date)?;
        let history = SymbolHistory::new(symbol, bars);

        if !history.has_bars_between(config.start_date, config.end_date) {
            return Err(SimulatorError::DataUnavailable {
                symbol: symbol.clone(),
                start: config.start_date,
                end: config.end_date,
            });
        }
        debug!(
            %symbol,
            bars = history.bar_count(),
            from = %load_start,
            "loaded price history"
        );
        histories.push(history);
    }

    Ok(PriceHistory::new(
        config.start_date,
        config.end_date,
        histories,
    ))
}

/// Run independent requests in parallel. Results keep request order.
pub fn run_batch(
    data_port: &dyn DataPort,
    requests: &[SimulationRequest],
) -> Vec<Result<SimulationResult, SimulatorError>> {
    requests
        .par_iter()
        .map(|request| run(data_port, request))
        .collect()
}
