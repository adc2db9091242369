//! Preloaded per-symbol price bars and the unified trading timeline.
//!
//! Each symbol's full range (lookback included) is loaded once per run and
//! indexed by date. Strategies read closes and indicator inputs from here
//! instead of going back to the repository day by day.

use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct SymbolHistory {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
    date_index: HashMap<NaiveDate, usize>,
}

impl SymbolHistory {
    pub fn new(symbol: &str, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            symbol: symbol.to_string(),
            bars,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.get_bar(date).map(|b| b.close)
    }

    /// Close of the latest bar dated on or before `date`.
    pub fn close_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.bars.partition_point(|b| b.date <= date);
        idx.checked_sub(1).map(|i| self.bars[i].close)
    }

    /// Dates of this symbol's bars inside `[start, end]`.
    pub fn dates_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        self.bars
            .iter()
            .map(|b| b.date)
            .filter(|d| *d >= start && *d <= end)
            .collect()
    }

    pub fn has_bars_between(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.bars.iter().any(|b| b.date >= start && b.date <= end)
    }
}

/// Every symbol a run needs, in the order the caller listed them.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    symbols: Vec<SymbolHistory>,
}

impl PriceHistory {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, symbols: Vec<SymbolHistory>) -> Self {
        Self {
            start_date,
            end_date,
            symbols,
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolHistory> {
        self.symbols.iter().find(|h| h.symbol == symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &SymbolHistory> {
        self.symbols.iter()
    }

    pub fn close_on(&self, symbol: &str, date: NaiveDate) -> Option<f64> {
        self.get(symbol).and_then(|h| h.close_on(date))
    }

    /// Union of all symbols' trading dates inside the simulation window.
    pub fn trading_dates(&self) -> Vec<NaiveDate> {
        build_unified_timeline(&self.symbols)
            .into_iter()
            .filter(|d| *d >= self.start_date && *d <= self.end_date)
            .collect()
    }
}

pub fn build_unified_timeline(histories: &[SymbolHistory]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = histories
        .iter()
        .flat_map(|h| h.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}
