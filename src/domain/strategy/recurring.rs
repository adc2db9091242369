//! Baseline: buy a fixed amount at every close, never sell.

use tracing::debug;

use crate::domain::error::SimulatorError;
use crate::domain::portfolio::Portfolio;
use crate::domain::price_history::PriceHistory;
use crate::domain::simulation::{ResultRow, SimulationConfig};
use crate::domain::strategy::{price_map, single_symbol, ParameterValues, Strategy};

pub const ID: &str = "simple_recurring";

#[derive(Debug, Clone, Default)]
pub struct SimpleRecurring;

impl SimpleRecurring {
    pub fn build(_params: &ParameterValues) -> Result<Box<dyn Strategy>, SimulatorError> {
        Ok(Box::new(SimpleRecurring))
    }
}

impl Strategy for SimpleRecurring {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "Simple Recurring"
    }

    fn description(&self) -> &'static str {
        "Invest the daily amount at every close and hold."
    }

    fn simulate(
        &self,
        history: &PriceHistory,
        config: &SimulationConfig,
    ) -> Result<Vec<ResultRow>, SimulatorError> {
        let symbol = single_symbol(history, config)?;
        let mut portfolio = Portfolio::new();
        let mut rows = Vec::new();

        for date in symbol.dates_between(config.start_date, config.end_date) {
            let Some(price) = symbol.close_on(date) else {
                continue;
            };
            let fill = portfolio.invest(&symbol.symbol, price, config.daily_investment);
            debug!(%date, price, shares = fill.shares, "recurring buy");

            let prices = price_map(&symbol.symbol, price);
            rows.push(ResultRow::snapshot(date, &portfolio, &prices, &fill));
        }

        Ok(rows)
    }
}
