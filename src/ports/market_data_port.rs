//! External market-data provider port trait.

use crate::domain::error::SimulatorError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

/// Source the repository fills itself from. Calls block and may fail;
/// retries are the implementation's concern.
pub trait MarketDataPort: Send + Sync {
    fn fetch_daily(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, SimulatorError>;
}
