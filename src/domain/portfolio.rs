//! Portfolio ledger: cash, positions, principal and profit high-water marks.
//!
//! Strategies mutate one `Portfolio` per run, once per trading day. Price
//! maps are keyed by symbol and hold that day's close.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use super::position::Position;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
    /// Cumulative contributions. Never decreases.
    pub principal_invested: f64,
    /// Running maximum of profit since the last reset.
    pub peak_profit: f64,
    /// Trailing-stop baseline; set to the realized profit on liquidation.
    pub reference_high: f64,
}

/// Outcome of a contribution-plus-buy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fill {
    /// New principal added by this buy. Zero when the buy was rejected.
    pub contributed: f64,
    pub shares: f64,
    pub cash_spent: f64,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add new money to the account; it counts towards principal.
    pub fn deposit(&mut self, amount: f64) {
        if amount > 0.0 {
            self.cash += amount;
            self.principal_invested += amount;
        }
    }

    /// Spend up to `cash_to_spend` of idle cash on `symbol` at `price`.
    ///
    /// Returns the shares acquired. A non-positive or non-finite price is
    /// rejected and acquires nothing.
    pub fn apply_buy(&mut self, symbol: &str, price: f64, cash_to_spend: f64) -> f64 {
        if !price.is_finite() || price <= 0.0 {
            return 0.0;
        }
        let spend = cash_to_spend.min(self.cash);
        if spend <= 0.0 {
            return 0.0;
        }
        let shares = spend / price;
        self.cash -= spend;
        self.positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::new(symbol))
            .add(shares);
        shares
    }

    /// Contribute `contribution` and spend all idle cash on `symbol`.
    ///
    /// The price is checked before the deposit so a rejected buy leaves
    /// principal and cash untouched.
    pub fn invest(&mut self, symbol: &str, price: f64, contribution: f64) -> Fill {
        if !price.is_finite() || price <= 0.0 {
            return Fill::default();
        }
        self.deposit(contribution);
        let cash_spent = self.cash;
        let shares = self.apply_buy(symbol, price, cash_spent);
        Fill {
            contributed: contribution.max(0.0),
            shares,
            cash_spent,
        }
    }

    /// Convert every open position to cash at the supplied prices.
    ///
    /// Returns the cash balance afterwards; with nothing held this is the
    /// current cash, unchanged. A position without a supplied price stays
    /// open.
    pub fn apply_liquidate_all(&mut self, prices: &HashMap<String, f64>) -> f64 {
        let symbols: Vec<String> = self.positions.keys().cloned().collect();
        for symbol in symbols {
            match prices.get(&symbol) {
                Some(&price) if price.is_finite() => {
                    if let Some(position) = self.positions.remove(&symbol) {
                        self.cash += position.market_value(price);
                    }
                }
                _ => warn!(%symbol, "no price to liquidate position, keeping it open"),
            }
        }
        self.cash
    }

    /// Cash plus the market value of every priced position.
    pub fn mark_to_market(&self, prices: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .filter_map(|pos| prices.get(&pos.symbol).map(|&price| pos.market_value(price)))
            .sum();
        self.cash + position_value
    }

    pub fn profit(&self, prices: &HashMap<String, f64>) -> f64 {
        self.mark_to_market(prices) - self.principal_invested
    }

    /// Raise `peak_profit` if `profit` exceeds it; returns the peak.
    pub fn update_peak(&mut self, profit: f64) -> f64 {
        if profit > self.peak_profit {
            self.peak_profit = profit;
        }
        self.peak_profit
    }

    pub fn shares_held(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.shares)
    }

    pub fn total_shares(&self) -> f64 {
        self.positions.values().map(|p| p.shares).sum()
    }

    pub fn has_positions(&self) -> bool {
        self.positions.values().any(Position::is_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn new_portfolio_is_all_zero() {
        let portfolio = Portfolio::new();
        assert_eq!(portfolio.cash, 0.0);
        assert_eq!(portfolio.principal_invested, 0.0);
        assert_eq!(portfolio.peak_profit, 0.0);
        assert_eq!(portfolio.reference_high, 0.0);
        assert!(portfolio.positions.is_empty());
    }

    #[test]
    fn invest_buys_fractional_shares() {
        let mut portfolio = Portfolio::new();
        let fill = portfolio.invest("AAPL", 30.0, 100.0);

        assert!((fill.shares - 100.0 / 30.0).abs() < 1e-12);
        assert_eq!(fill.contributed, 100.0);
        assert_eq!(portfolio.cash, 0.0);
        assert_eq!(portfolio.principal_invested, 100.0);
        assert!((portfolio.shares_held("AAPL") - 100.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn invest_with_bad_price_is_zero_share_no_op() {
        let mut portfolio = Portfolio::new();
        for price in [0.0, -5.0, f64::NAN] {
            let fill = portfolio.invest("AAPL", price, 100.0);
            assert_eq!(fill, Fill::default());
        }
        assert_eq!(portfolio.principal_invested, 0.0);
        assert_eq!(portfolio.cash, 0.0);
        assert!(portfolio.positions.is_empty());
    }

    #[test]
    fn invest_sweeps_idle_cash() {
        let mut portfolio = Portfolio::new();
        portfolio.cash = 400.0;
        let fill = portfolio.invest("MSFT", 50.0, 100.0);

        assert!((fill.shares - 10.0).abs() < f64::EPSILON);
        assert!((fill.cash_spent - 500.0).abs() < f64::EPSILON);
        assert_eq!(portfolio.principal_invested, 100.0);
    }

    #[test]
    fn apply_buy_is_capped_by_cash() {
        let mut portfolio = Portfolio::new();
        portfolio.deposit(50.0);
        let shares = portfolio.apply_buy("AAPL", 10.0, 80.0);
        assert!((shares - 5.0).abs() < f64::EPSILON);
        assert_eq!(portfolio.cash, 0.0);
    }

    #[test]
    fn liquidate_all_realizes_every_position() {
        let mut portfolio = Portfolio::new();
        portfolio.invest("AAPL", 10.0, 100.0);
        portfolio.invest("MSFT", 20.0, 100.0);

        let cash = portfolio.apply_liquidate_all(&prices(&[("AAPL", 12.0), ("MSFT", 18.0)]));

        assert!((cash - (120.0 + 90.0)).abs() < 1e-9);
        assert!(portfolio.positions.is_empty());
        assert_eq!(portfolio.total_shares(), 0.0);
        assert_eq!(portfolio.principal_invested, 200.0);
    }

    #[test]
    fn liquidate_all_is_idempotent_when_flat() {
        let mut portfolio = Portfolio::new();
        portfolio.cash = 250.0;
        assert_eq!(portfolio.apply_liquidate_all(&HashMap::new()), 250.0);
        assert_eq!(portfolio.apply_liquidate_all(&HashMap::new()), 250.0);
    }

    #[test]
    fn mark_to_market_with_positions() {
        let mut portfolio = Portfolio::new();
        portfolio.invest("AAPL", 10.0, 100.0);
        portfolio.cash = 5.0;

        let value = portfolio.mark_to_market(&prices(&[("AAPL", 11.0)]));
        assert!((value - 115.0).abs() < 1e-9);
        assert!((portfolio.profit(&prices(&[("AAPL", 11.0)])) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn update_peak_only_rises() {
        let mut portfolio = Portfolio::new();
        assert_eq!(portfolio.update_peak(-10.0), 0.0);
        assert_eq!(portfolio.update_peak(25.0), 25.0);
        assert_eq!(portfolio.update_peak(5.0), 25.0);
    }
}
