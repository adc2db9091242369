#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use investsim::domain::error::SimulatorError;
pub use investsim::domain::ohlcv::PriceBar;
use investsim::domain::simulation::SimulationConfig;
use investsim::ports::data_port::DataPort;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    pub today: NaiveDate,
    pub coverage_calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            today: date("2025-12-31"),
            coverage_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn with_today(mut self, today: &str) -> Self {
        self.today = date(today);
        self
    }

    pub fn coverage_requests(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
        self.coverage_calls.lock().unwrap().clone()
    }
}

impl DataPort for MockDataPort {
    fn get_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, SimulatorError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SimulatorError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn ensure_coverage(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(), SimulatorError> {
        self.coverage_calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), start_date, end_date));
        Ok(())
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SimulatorError> {
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(symbol: &str, day: &str, close: f64) -> PriceBar {
    PriceBar::from_close(symbol, date(day), close)
}

/// One bar per calendar day starting at `start`.
pub fn daily_bars(symbol: &str, start: &str, closes: &[f64]) -> Vec<PriceBar> {
    let first = date(start);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar::from_close(symbol, first + Duration::days(i as i64), close))
        .collect()
}

/// `count` closes moving linearly from `from` by `step` per bar.
pub fn linear(from: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| from + step * i as f64).collect()
}

pub fn sim_config(symbols: &[&str], start: &str, end: &str, daily: f64) -> SimulationConfig {
    SimulationConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        start_date: date(start),
        end_date: date(end),
        daily_investment: daily,
    }
}
