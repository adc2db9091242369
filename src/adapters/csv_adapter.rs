//! CSV directory data adapter.
//!
//! One `<SYMBOL>.csv` per symbol with header `date,open,high,low,close,volume`.
//! Serves as a read-only repository and as a market-data provider for the
//! SQLite repository.

use crate::domain::error::SimulatorError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::DataPort;
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// All bars in the file, sorted ascending. `None` when the file does not
    /// exist.
    fn read_all(&self, symbol: &str) -> Result<Option<Vec<PriceBar>>, SimulatorError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SimulatorError::Database {
                    reason: format!("failed to read {}: {}", path.display(), e),
                })
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| SimulatorError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date_str: String = field(&record, 0, "date")?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                SimulatorError::Database {
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            bars.push(PriceBar {
                symbol: symbol.to_string(),
                date,
                open: field(&record, 1, "open")?,
                high: field(&record, 2, "high")?,
                low: field(&record, 3, "low")?,
                close: field(&record, 4, "close")?,
                volume: field(&record, 5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(Some(bars))
    }

    fn read_range(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Option<Vec<PriceBar>>, SimulatorError> {
        Ok(self.read_all(symbol)?.map(|bars| {
            bars.into_iter()
                .filter(|b| b.date >= start_date && b.date <= end_date)
                .collect()
        }))
    }
}

fn field<T: FromStr>(record: &csv::StringRecord, index: usize, name: &str) -> Result<T, SimulatorError>
where
    T::Err: std::fmt::Display,
{
    record
        .get(index)
        .ok_or_else(|| SimulatorError::Database {
            reason: format!("missing {} column", name),
        })?
        .trim()
        .parse()
        .map_err(|e| SimulatorError::Database {
            reason: format!("invalid {} value: {}", name, e),
        })
}

impl DataPort for CsvAdapter {
    /// A symbol without a file has no bars.
    fn get_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, SimulatorError> {
        Ok(self
            .read_range(symbol, start_date, end_date)?
            .unwrap_or_default())
    }

    /// Files are maintained outside the simulator.
    fn ensure_coverage(
        &self,
        _symbol: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<(), SimulatorError> {
        Ok(())
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SimulatorError> {
        Ok(self.read_all(symbol)?.and_then(|bars| {
            let first = bars.first()?.date;
            let last = bars.last()?.date;
            Some((first, last, bars.len()))
        }))
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_daily(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, SimulatorError> {
        self.read_range(symbol, start_date, end_date)?
            .ok_or_else(|| SimulatorError::Provider {
                symbol: symbol.to_string(),
                reason: format!("no file {}", self.csv_path(symbol).display()),
            })
    }
}
