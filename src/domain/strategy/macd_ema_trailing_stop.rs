//! MACD + EMA entry with a trailing-stop exit.
//!
//! There is no mode flag. Each day, on the profit before any transaction:
//!
//! 1. A new all-time profit high raises `peak_profit`, and `reference_high`
//!    with it. Gains below the old peak leave the post-sale baseline alone.
//! 2. Sell everything if the trailing stop fires
//!    (`reference_high > 0` and profit `< reference_high * (1 - stop)`) or
//!    the close is below an available EMA. A sale sets `reference_high` to
//!    the profit realized by that sale.
//! 3. Re-evaluate the buy gate on the post-sale state: MACD above signal and
//!    the close above the EMA (an unavailable EMA passes). When it holds,
//!    invest idle cash plus the daily amount.

use tracing::{debug, info};

use crate::domain::error::SimulatorError;
use crate::domain::indicator::macd::{DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::indicator::{calculate_ema, calculate_macd_default};
use crate::domain::portfolio::{Fill, Portfolio};
use crate::domain::price_history::PriceHistory;
use crate::domain::simulation::{ResultRow, SimulationConfig};
use crate::domain::strategy::{price_map, single_symbol, ParameterSpec, ParameterValues, Strategy};

pub const ID: &str = "macd_ema_trailing_stop";

pub const TRAILING_STOP_PERCENTAGE: ParameterSpec = ParameterSpec {
    name: "trailing_stop_percentage",
    label: "Trailing Stop (%)",
    default: 10.0,
    min: 0.1,
    max: 50.0,
    integer: false,
    help: "Drop from the reference profit that sells the position",
};

pub const EMA_PERIOD: ParameterSpec = ParameterSpec {
    name: "ema_period",
    label: "EMA Period",
    default: 50.0,
    min: 2.0,
    max: 200.0,
    integer: true,
    help: "Trend filter: buy only above this EMA, sell below it",
};

/// Why a sale happened. Both triggers may fire on the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellReason {
    pub trailing_stop: bool,
    pub below_ema: bool,
}

impl SellReason {
    pub fn any(self) -> bool {
        self.trailing_stop || self.below_ema
    }

    pub fn label(self) -> &'static str {
        match (self.trailing_stop, self.below_ema) {
            (true, true) => "Sold (trailing stop and price below EMA)",
            (true, false) => "Sold (trailing stop)",
            (false, true) => "Sold (price below EMA)",
            (false, false) => "Waiting",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MacdEmaTrailingStop {
    /// Fraction, not percent.
    stop: f64,
    ema_period: usize,
}

impl MacdEmaTrailingStop {
    pub fn new(trailing_stop_pct: f64, ema_period: usize) -> Self {
        Self {
            stop: trailing_stop_pct / 100.0,
            ema_period,
        }
    }

    pub fn build(params: &ParameterValues) -> Result<Box<dyn Strategy>, SimulatorError> {
        Ok(Box::new(Self::new(
            params.resolve(&TRAILING_STOP_PERCENTAGE)?,
            params.resolve_usize(&EMA_PERIOD)?,
        )))
    }
}

impl Strategy for MacdEmaTrailingStop {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "MACD EMA Trailing Stop"
    }

    fn description(&self) -> &'static str {
        "Buy while MACD is bullish above the EMA; sell on a trailing stop or an EMA breach."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![TRAILING_STOP_PERCENTAGE, EMA_PERIOD]
    }

    fn lookback_days(&self) -> i64 {
        let macd_lookback = (DEFAULT_SLOW + DEFAULT_SIGNAL) as i64 + 60;
        macd_lookback.max(2 * self.ema_period as i64)
    }

    fn simulate(
        &self,
        history: &PriceHistory,
        config: &SimulationConfig,
    ) -> Result<Vec<ResultRow>, SimulatorError> {
        let symbol = single_symbol(history, config)?;
        let macd = calculate_macd_default(&symbol.bars);
        let ema = calculate_ema(&symbol.bars, self.ema_period);

        let mut portfolio = Portfolio::new();
        let mut rows = Vec::new();

        for date in symbol.dates_between(config.start_date, config.end_date) {
            let Some(price) = symbol.close_on(date) else {
                continue;
            };
            let prices = price_map(&symbol.symbol, price);
            let ema_value = ema.simple_at(date);

            let profit = portfolio.profit(&prices);
            if profit > portfolio.peak_profit {
                portfolio.update_peak(profit);
                portfolio.reference_high = portfolio.reference_high.max(profit);
            }

            let reason = SellReason {
                trailing_stop: portfolio.reference_high > 0.0
                    && profit < portfolio.reference_high * (1.0 - self.stop),
                below_ema: ema_value.is_some_and(|e| price < e),
            };

            let sold = reason.any() && portfolio.has_positions();
            if sold {
                let cash = portfolio.apply_liquidate_all(&prices);
                portfolio.reference_high = cash - portfolio.principal_invested;
                info!(
                    %date,
                    price,
                    ema = ?ema_value,
                    realized = portfolio.reference_high,
                    peak = portfolio.peak_profit,
                    reason = reason.label(),
                    "sold everything"
                );
            }

            let macd_bullish = macd.macd_at(date).is_some_and(|r| r.is_bullish());
            let above_ema = ema_value.is_none_or(|e| price > e);
            let fill = if macd_bullish && above_ema {
                portfolio.invest(&symbol.symbol, price, config.daily_investment)
            } else {
                Fill::default()
            };
            debug!(
                %date,
                price,
                profit,
                reference = portfolio.reference_high,
                macd_bullish,
                above_ema,
                shares = fill.shares,
                "trailing stop day"
            );

            let label = match (sold, fill.shares > 0.0) {
                (true, true) => format!("{}, rebought", reason.label()),
                (true, false) => reason.label().to_string(),
                (false, true) => "Buying".to_string(),
                (false, false) => "Waiting".to_string(),
            };
            rows.push(
                ResultRow::snapshot(date, &portfolio, &prices, &fill)
                    .with_state(label)
                    .with_trailing_reference(portfolio.reference_high),
            );
        }

        Ok(rows)
    }
}
