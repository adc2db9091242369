//! Price repository port trait.

use crate::domain::error::SimulatorError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

/// Keyed, date-ranged store of daily bars.
///
/// Reads may run concurrently from independent simulation runs; writes
/// triggered by `ensure_coverage` must be serialized per symbol by the
/// implementation.
pub trait DataPort: Send + Sync {
    /// Bars for `symbol` in `[start_date, end_date]`, ascending by date.
    /// Days without trading are absent, never zero-filled.
    fn get_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, SimulatorError>;

    /// Fetch and persist any missing bars in range. May be a no-op.
    fn ensure_coverage(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(), SimulatorError>;

    /// (first date, last date, bar count) stored for `symbol`.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SimulatorError>;

    /// The repository's notion of "today"; simulation dates may not pass it.
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}
