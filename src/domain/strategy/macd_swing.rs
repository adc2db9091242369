//! MACD swing: buy daily while MACD is above its signal, go to cash below.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::error::SimulatorError;
use crate::domain::indicator::{calculate_macd, IndicatorSeries};
use crate::domain::portfolio::{Fill, Portfolio};
use crate::domain::price_history::PriceHistory;
use crate::domain::simulation::{ResultRow, SimulationConfig};
use crate::domain::strategy::{
    price_map, single_symbol, ParameterSpec, ParameterValues, Strategy, PARAMETER_SECTION,
};

pub const ID: &str = "macd_swing";

pub const MACD_FAST: ParameterSpec = ParameterSpec {
    name: "macd_fast",
    label: "MACD Fast Period",
    default: 12.0,
    min: 2.0,
    max: 50.0,
    integer: true,
    help: "Span of the fast EMA",
};

pub const MACD_SLOW: ParameterSpec = ParameterSpec {
    name: "macd_slow",
    label: "MACD Slow Period",
    default: 26.0,
    min: 2.0,
    max: 100.0,
    integer: true,
    help: "Span of the slow EMA; must exceed the fast period",
};

pub const MACD_SIGNAL: ParameterSpec = ParameterSpec {
    name: "macd_signal",
    label: "MACD Signal Period",
    default: 9.0,
    min: 2.0,
    max: 50.0,
    integer: true,
    help: "Span of the signal line EMA",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingState {
    Waiting,
    Buying,
}

impl SwingState {
    pub fn label(self) -> &'static str {
        match self {
            SwingState::Waiting => "Waiting for MACD Crossover Up",
            SwingState::Buying => "Buying",
        }
    }
}

/// Buying when MACD is already above signal on the first date, so an
/// active bullish regime is not missed for want of a literal crossover.
pub fn initial_state(macd: &IndicatorSeries, date: NaiveDate) -> SwingState {
    match macd.macd_at(date) {
        Some(reading) if reading.is_bullish() => SwingState::Buying,
        _ => SwingState::Waiting,
    }
}

/// Next state for `date`. An unavailable MACD keeps the current state.
pub fn next_state(state: SwingState, macd: &IndicatorSeries, date: NaiveDate) -> SwingState {
    let reading = macd.macd_at(date);
    match state {
        SwingState::Waiting => {
            if macd.crossed_above(date) || reading.is_some_and(|r| r.is_bullish()) {
                SwingState::Buying
            } else {
                SwingState::Waiting
            }
        }
        SwingState::Buying => {
            if macd.crossed_below(date) || reading.is_some_and(|r| !r.is_bullish()) {
                SwingState::Waiting
            } else {
                SwingState::Buying
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MacdSwing {
    fast: usize,
    slow: usize,
    signal: usize,
}

impl MacdSwing {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self { fast, slow, signal }
    }

    pub fn build(params: &ParameterValues) -> Result<Box<dyn Strategy>, SimulatorError> {
        let fast = params.resolve_usize(&MACD_FAST)?;
        let slow = params.resolve_usize(&MACD_SLOW)?;
        let signal = params.resolve_usize(&MACD_SIGNAL)?;
        if fast >= slow {
            return Err(SimulatorError::invalid(
                PARAMETER_SECTION,
                MACD_FAST.name,
                "fast period must be less than slow period",
            ));
        }
        Ok(Box::new(Self::new(fast, slow, signal)))
    }
}

impl Strategy for MacdSwing {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "MACD Swing"
    }

    fn description(&self) -> &'static str {
        "Invest daily while MACD is above signal; sell everything on a crossdown."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![MACD_FAST, MACD_SLOW, MACD_SIGNAL]
    }

    fn lookback_days(&self) -> i64 {
        (self.slow + self.signal) as i64 + 60
    }

    fn simulate(
        &self,
        history: &PriceHistory,
        config: &SimulationConfig,
    ) -> Result<Vec<ResultRow>, SimulatorError> {
        let symbol = single_symbol(history, config)?;
        let macd = calculate_macd(&symbol.bars, self.fast, self.slow, self.signal);
        let dates = symbol.dates_between(config.start_date, config.end_date);

        let mut state = dates
            .first()
            .map_or(SwingState::Waiting, |&d| initial_state(&macd, d));
        info!(symbol = %symbol.symbol, state = state.label(), "initial MACD state");

        let mut portfolio = Portfolio::new();
        let mut rows = Vec::with_capacity(dates.len());

        for date in dates {
            let Some(price) = symbol.close_on(date) else {
                continue;
            };
            let prices = price_map(&symbol.symbol, price);

            let next = next_state(state, &macd, date);
            if next != state {
                debug!(%date, from = state.label(), to = next.label(), "MACD state change");
                if next == SwingState::Waiting {
                    let cash = portfolio.apply_liquidate_all(&prices);
                    info!(%date, price, cash, "MACD crossed below signal, sold everything");
                }
                state = next;
            }

            let fill = match state {
                SwingState::Buying => portfolio.invest(&symbol.symbol, price, config.daily_investment),
                SwingState::Waiting => Fill::default(),
            };
            if let Some(reading) = macd.macd_at(date) {
                debug!(
                    %date,
                    price,
                    macd = reading.line,
                    signal = reading.signal,
                    state = state.label(),
                    "MACD swing day"
                );
            }

            rows.push(
                ResultRow::snapshot(date, &portfolio, &prices, &fill).with_state(state.label()),
            );
        }

        Ok(rows)
    }
}
