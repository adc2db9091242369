//! RSI rotation: hold the most oversold candidate, rotate on a profit drawdown.
//!
//! The held symbol is chosen by lowest RSI among the caller's candidates,
//! on the first trading date and again after every liquidation. Each day the
//! daily amount is invested in the held symbol. Once profit has been
//! positive, a fall below `peak * (1 - threshold)` liquidates everything,
//! reselects, and reinvests cash plus the day's amount on the same date.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::error::SimulatorError;
use crate::domain::indicator::{calculate_rsi, IndicatorSeries};
use crate::domain::portfolio::{Fill, Portfolio};
use crate::domain::price_history::PriceHistory;
use crate::domain::simulation::{ResultRow, SimulationConfig};
use crate::domain::strategy::{price_map, ParameterSpec, ParameterValues, Strategy};

pub const ID: &str = "rsi_swing";

pub const RSI_PERIOD: ParameterSpec = ParameterSpec {
    name: "rsi_period",
    label: "RSI Period",
    default: 14.0,
    min: 2.0,
    max: 50.0,
    integer: true,
    help: "Price changes averaged into each RSI value",
};

pub const PROFIT_DROP_THRESHOLD: ParameterSpec = ParameterSpec {
    name: "profit_drop_threshold",
    label: "Profit Drop Threshold (%)",
    default: 10.0,
    min: 1.0,
    max: 50.0,
    integer: false,
    help: "Drawdown from peak profit that triggers a rotation",
};

const HOLDING: &str = "Holding";
const SWITCHED: &str = "Switched";

#[derive(Debug, Clone)]
pub struct RsiRotation {
    rsi_period: usize,
    /// Fraction, not percent.
    drop_threshold: f64,
}

impl RsiRotation {
    pub fn new(rsi_period: usize, drop_threshold_pct: f64) -> Self {
        Self {
            rsi_period,
            drop_threshold: drop_threshold_pct / 100.0,
        }
    }

    pub fn build(params: &ParameterValues) -> Result<Box<dyn Strategy>, SimulatorError> {
        Ok(Box::new(Self::new(
            params.resolve_usize(&RSI_PERIOD)?,
            params.resolve(&PROFIT_DROP_THRESHOLD)?,
        )))
    }
}

/// Candidate with the lowest available RSI at `date`. Ties keep the
/// earlier candidate; with no RSI available anywhere, the first candidate.
fn select_symbol<'a>(
    candidates: &'a [String],
    rsi: &HashMap<&str, IndicatorSeries>,
    date: NaiveDate,
) -> &'a str {
    let mut best: Option<(&str, f64)> = None;
    for symbol in candidates {
        let Some(value) = rsi.get(symbol.as_str()).and_then(|s| s.simple_at(date)) else {
            continue;
        };
        debug!(%date, %symbol, rsi = value, "candidate rsi");
        if best.is_none_or(|(_, lowest)| value < lowest) {
            best = Some((symbol.as_str(), value));
        }
    }
    match best {
        Some((symbol, _)) => symbol,
        None => {
            debug!(%date, "no candidate has an RSI yet, falling back to first");
            candidates.first().map_or("", String::as_str)
        }
    }
}

impl Strategy for RsiRotation {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "RSI Swing"
    }

    fn description(&self) -> &'static str {
        "Hold the lowest-RSI candidate; rotate when profit falls from its peak."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![RSI_PERIOD, PROFIT_DROP_THRESHOLD]
    }

    fn lookback_days(&self) -> i64 {
        self.rsi_period as i64 + 30
    }

    fn requires_symbol_list(&self) -> bool {
        true
    }

    fn simulate(
        &self,
        history: &PriceHistory,
        config: &SimulationConfig,
    ) -> Result<Vec<ResultRow>, SimulatorError> {
        let mut rsi = HashMap::new();
        for symbol in &config.symbols {
            let bars = history
                .get(symbol)
                .ok_or_else(|| SimulatorError::DataUnavailable {
                    symbol: symbol.clone(),
                    start: config.start_date,
                    end: config.end_date,
                })?;
            rsi.insert(symbol.as_str(), calculate_rsi(&bars.bars, self.rsi_period));
        }

        let mut portfolio = Portfolio::new();
        let mut rows = Vec::new();
        let mut current: Option<&str> = None;

        for date in history.trading_dates() {
            let symbol = *current.get_or_insert_with(|| {
                let chosen = select_symbol(&config.symbols, &rsi, date);
                info!(%date, symbol = chosen, "initial selection");
                chosen
            });

            let Some(price) = history.close_on(symbol, date) else {
                debug!(%date, %symbol, "no bar for held symbol, skipping day");
                continue;
            };
            let prices = price_map(symbol, price);

            let profit = portfolio.profit(&prices);
            let peak = portfolio.update_peak(profit);
            let trigger = peak * (1.0 - self.drop_threshold);

            if peak > 0.0 && profit < trigger {
                let cash = portfolio.apply_liquidate_all(&prices);
                let next = select_symbol(&config.symbols, &rsi, date);
                portfolio.peak_profit = profit.max(0.0);
                info!(
                    %date,
                    from = symbol,
                    to = next,
                    profit,
                    peak,
                    cash,
                    "profit dropped below threshold, rotating"
                );
                current = Some(next);

                let (fill, prices) = match history.close_on(next, date) {
                    Some(next_price) => (
                        portfolio.invest(next, next_price, config.daily_investment),
                        price_map(next, next_price),
                    ),
                    None => {
                        debug!(%date, symbol = next, "no bar for new symbol, cash stays idle");
                        (Fill::default(), HashMap::new())
                    }
                };
                rows.push(
                    ResultRow::snapshot(date, &portfolio, &prices, &fill)
                        .with_symbol(next)
                        .with_state(SWITCHED),
                );
                continue;
            }

            let fill = portfolio.invest(symbol, price, config.daily_investment);
            debug!(%date, %symbol, price, profit, peak, shares = fill.shares, "holding");
            rows.push(
                ResultRow::snapshot(date, &portfolio, &prices, &fill)
                    .with_symbol(symbol)
                    .with_state(HOLDING),
            );
        }

        Ok(rows)
    }
}
