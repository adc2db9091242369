//! SQLite price repository with coverage bookkeeping.
//!
//! Bars live in `daily_prices`; every range fetched from the market-data
//! provider is recorded in `coverage`, so a request inside a recorded range
//! never goes back to the provider. Reads go through the pool and may run
//! concurrently; ingestion is serialized per symbol.

use crate::domain::error::SimulatorError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
    provider: Option<Arc<dyn MarketDataPort>>,
    ingest_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn pool_error(e: r2d2::Error) -> SimulatorError {
    SimulatorError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> SimulatorError {
    SimulatorError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, SimulatorError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| SimulatorError::Database {
        reason: format!("bad stored date {value}: {e}"),
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SimulatorError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| SimulatorError::missing("sqlite", "path"))?;

        let pool_size = config.get_int("sqlite", "pool_size", 4);
        if pool_size < 1 {
            return Err(SimulatorError::invalid(
                "sqlite",
                "pool_size",
                "pool_size must be at least 1",
            ));
        }

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size as u32)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self::with_pool(pool);
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, SimulatorError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self::with_pool(pool))
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>) -> Self {
        Self {
            pool,
            provider: None,
            ingest_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Fill missing ranges from `provider` in `ensure_coverage`.
    pub fn with_provider(mut self, provider: Arc<dyn MarketDataPort>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn initialize_schema(&self) -> Result<(), SimulatorError> {
        let conn = self.pool.get().map_err(pool_error)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS daily_prices (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE TABLE IF NOT EXISTS coverage (
                symbol TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_coverage_symbol ON coverage(symbol);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    /// Upsert bars in one transaction, optionally recording a covered range.
    pub fn insert_bars(
        &self,
        bars: &[PriceBar],
        covered: Option<(&str, NaiveDate, NaiveDate)>,
    ) -> Result<(), SimulatorError> {
        let mut conn = self.pool.get().map_err(pool_error)?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO daily_prices (symbol, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    bar.symbol,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_error)?;
        }

        if let Some((symbol, start, end)) = covered {
            tx.execute(
                "INSERT INTO coverage (symbol, start_date, end_date) VALUES (?1, ?2, ?3)",
                params![
                    symbol,
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }

    /// True when one recorded range contains `[start_date, end_date]`.
    pub fn is_covered(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<bool, SimulatorError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM coverage
                 WHERE symbol = ?1 AND start_date <= ?2 AND end_date >= ?3",
                params![
                    symbol,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| row.get(0),
            )
            .map_err(query_error)?;
        Ok(count > 0)
    }

    fn ingest_lock(&self, symbol: &str) -> Result<Arc<Mutex<()>>, SimulatorError> {
        let mut locks = self.ingest_locks.lock().map_err(|_| SimulatorError::Database {
            reason: "ingest lock table poisoned".into(),
        })?;
        Ok(locks.entry(symbol.to_string()).or_default().clone())
    }
}

impl DataPort for SqliteAdapter {
    fn get_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, SimulatorError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let query = "SELECT symbol, date, open, high, low, close, volume
                     FROM daily_prices
                     WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                     ORDER BY date ASC";

        let mut stmt = conn.prepare(query).map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let date_str: String = row.get(1)?;
                    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    Ok(PriceBar {
                        symbol: row.get(0)?,
                        date,
                        open: row.get(2)?,
                        high: row.get(3)?,
                        low: row.get(4)?,
                        close: row.get(5)?,
                        volume: row.get(6)?,
                    })
                },
            )
            .map_err(query_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn ensure_coverage(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(), SimulatorError> {
        let Some(provider) = &self.provider else {
            return Ok(());
        };

        let lock = self.ingest_lock(symbol)?;
        let _guard = lock.lock().map_err(|_| SimulatorError::Database {
            reason: format!("ingest lock for {symbol} poisoned"),
        })?;

        if self.is_covered(symbol, start_date, end_date)? {
            debug!(%symbol, %start_date, %end_date, "range already covered");
            return Ok(());
        }

        let bars = provider.fetch_daily(symbol, start_date, end_date)?;
        if bars.is_empty() {
            warn!(%symbol, %start_date, %end_date, "provider returned no bars");
            return Ok(());
        }
        if let Some(stray) = bars
            .iter()
            .find(|b| b.symbol != symbol || b.date < start_date || b.date > end_date)
        {
            return Err(SimulatorError::Provider {
                symbol: symbol.to_string(),
                reason: format!(
                    "returned {} {} outside requested {}..{}",
                    stray.symbol, stray.date, start_date, end_date
                ),
            });
        }

        self.insert_bars(&bars, Some((symbol, start_date, end_date)))?;
        info!(%symbol, bars = bars.len(), %start_date, %end_date, "stored fetched bars");
        Ok(())
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SimulatorError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM daily_prices WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => Ok(Some((
                parse_date(&min_str)?,
                parse_date(&max_str)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    /// Provider serving a fixed set of bars and counting calls.
    struct FixedProvider {
        bars: Vec<PriceBar>,
        calls: AtomicUsize,
    }

    impl MarketDataPort for FixedProvider {
        fn fetch_daily(
            &self,
            symbol: &str,
            start_date: NaiveDate,
            end_date: NaiveDate,
        ) -> Result<Vec<PriceBar>, SimulatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .bars
                .iter()
                .filter(|b| b.symbol == symbol && b.date >= start_date && b.date <= end_date)
                .cloned()
                .collect())
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn bar(symbol: &str, day: u32, close: f64) -> PriceBar {
        PriceBar {
            symbol: symbol.to_string(),
            date: date(day),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000,
        }
    }

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn with_provider(bars: Vec<PriceBar>) -> (SqliteAdapter, Arc<FixedProvider>) {
        let provider = Arc::new(FixedProvider {
            bars,
            calls: AtomicUsize::new(0),
        });
        (adapter().with_provider(provider.clone()), provider)
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(SimulatorError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn get_bars_returns_range_in_order() {
        let adapter = adapter();
        adapter
            .insert_bars(&[bar("AAPL", 3, 102.0), bar("AAPL", 1, 100.0), bar("MSFT", 2, 50.0)], None)
            .unwrap();

        let fetched = adapter.get_bars("AAPL", date(1), date(3)).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].date, date(1));
        assert_eq!(fetched[1].close, 102.0);
        assert_eq!(fetched[1].symbol, "AAPL");
    }

    #[test]
    fn insert_is_upsert() {
        let adapter = adapter();
        adapter.insert_bars(&[bar("AAPL", 1, 100.0)], None).unwrap();
        adapter.insert_bars(&[bar("AAPL", 1, 101.0)], None).unwrap();

        let fetched = adapter.get_bars("AAPL", date(1), date(1)).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].close, 101.0);
    }

    #[test]
    fn data_range() {
        let adapter = adapter();
        assert!(adapter.get_data_range("AAPL").unwrap().is_none());

        adapter
            .insert_bars(&[bar("AAPL", 1, 100.0), bar("AAPL", 5, 102.5)], None)
            .unwrap();
        assert_eq!(
            adapter.get_data_range("AAPL").unwrap(),
            Some((date(1), date(5), 2))
        );
    }

    #[test]
    fn ensure_coverage_without_provider_is_noop() {
        let adapter = adapter();
        adapter.ensure_coverage("AAPL", date(1), date(5)).unwrap();
        assert!(!adapter.is_covered("AAPL", date(1), date(5)).unwrap());
    }

    #[test]
    fn ensure_coverage_fetches_once() {
        let (adapter, provider) =
            with_provider(vec![bar("AAPL", 2, 100.0), bar("AAPL", 3, 101.0)]);

        adapter.ensure_coverage("AAPL", date(1), date(5)).unwrap();
        assert_eq!(adapter.get_bars("AAPL", date(1), date(5)).unwrap().len(), 2);
        assert!(adapter.is_covered("AAPL", date(2), date(4)).unwrap());

        adapter.ensure_coverage("AAPL", date(2), date(4)).unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        adapter.ensure_coverage("AAPL", date(1), date(9)).unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_fetch_is_not_recorded() {
        let (adapter, provider) = with_provider(vec![]);
        adapter.ensure_coverage("AAPL", date(1), date(5)).unwrap();
        adapter.ensure_coverage("AAPL", date(1), date(5)).unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    /// Provider that ignores the requested range.
    struct SloppyProvider;

    impl MarketDataPort for SloppyProvider {
        fn fetch_daily(
            &self,
            symbol: &str,
            _start_date: NaiveDate,
            _end_date: NaiveDate,
        ) -> Result<Vec<PriceBar>, SimulatorError> {
            Ok(vec![bar(symbol, 20, 100.0)])
        }
    }

    #[test]
    fn out_of_range_bars_are_rejected() {
        let adapter = adapter().with_provider(Arc::new(SloppyProvider));
        let result = adapter.ensure_coverage("AAPL", date(1), date(5));
        assert!(matches!(result, Err(SimulatorError::Provider { .. })));
        assert!(adapter.get_bars("AAPL", date(1), date(31)).unwrap().is_empty());
    }
}
