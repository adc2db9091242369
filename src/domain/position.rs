//! Open position tracking.

/// Fractional long holding in one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub shares: f64,
}

impl Position {
    pub fn new(symbol: &str) -> Self {
        Position {
            symbol: symbol.to_string(),
            shares: 0.0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.shares > 0.0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }

    pub(crate) fn add(&mut self, shares: f64) {
        self.shares += shares;
    }
}
