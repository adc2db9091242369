//! Daily price bar representation.

use chrono::NaiveDate;

/// One trading day for one symbol. Keyed by (symbol, date); only `close`
/// drives the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// Bar with all prices set to `close`, used where only the close matters.
    pub fn from_close(symbol: &str, date: NaiveDate, close: f64) -> Self {
        PriceBar {
            symbol: symbol.to_string(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        }
    }

    /// A close that can be traded against. Zero, negative and NaN closes are
    /// clamped to zero-share buys by the ledger instead of aborting a run.
    pub fn has_tradable_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}
