//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A date-aligned time series of indicator values
//!
//! Every series is causal: the point for date D is computed from bars with
//! date <= D only. Points inside the warmup window carry `valid == false` and
//! must be read as "unavailable", never as zero.

pub mod ema;
pub mod macd;
pub mod rsi;

pub use ema::{calculate_ema, ema_values};
pub use macd::{calculate_macd, calculate_macd_default};
pub use rsi::{calculate_rsi, RsiIter};

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

/// MACD triple read from a valid point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdReading {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdReading {
    pub fn is_bullish(&self) -> bool {
        self.line > self.signal
    }
}

impl IndicatorSeries {
    /// Latest point dated on or before `date`, if that point is valid.
    ///
    /// A warmup point shadows older ones: the lookup does not fall back to
    /// an earlier date.
    pub fn point_at(&self, date: NaiveDate) -> Option<&IndicatorPoint> {
        let idx = self.values.partition_point(|p| p.date <= date);
        if idx == 0 {
            return None;
        }
        let point = &self.values[idx - 1];
        point.valid.then_some(point)
    }

    pub fn simple_at(&self, date: NaiveDate) -> Option<f64> {
        match self.point_at(date)?.value {
            IndicatorValue::Simple(v) => Some(v),
            _ => None,
        }
    }

    pub fn macd_at(&self, date: NaiveDate) -> Option<MacdReading> {
        self.point_at(date).and_then(macd_reading)
    }

    /// Bullish crossover: the previous point had line <= signal and the point
    /// at `date` has line > signal. Both points must be valid.
    pub fn crossed_above(&self, date: NaiveDate) -> bool {
        match self.macd_pair_at(date) {
            Some((prev, cur)) => prev.line <= prev.signal && cur.line > cur.signal,
            None => false,
        }
    }

    /// Bearish crossdown: previous line >= signal, current line < signal.
    pub fn crossed_below(&self, date: NaiveDate) -> bool {
        match self.macd_pair_at(date) {
            Some((prev, cur)) => prev.line >= prev.signal && cur.line < cur.signal,
            None => false,
        }
    }

    fn macd_pair_at(&self, date: NaiveDate) -> Option<(MacdReading, MacdReading)> {
        let idx = self.values.partition_point(|p| p.date <= date);
        if idx < 2 {
            return None;
        }
        let cur = &self.values[idx - 1];
        let prev = &self.values[idx - 2];
        if !cur.valid || !prev.valid {
            return None;
        }
        Some((macd_reading(prev)?, macd_reading(cur)?))
    }
}

fn macd_reading(point: &IndicatorPoint) -> Option<MacdReading> {
    match point.value {
        IndicatorValue::Macd {
            line,
            signal,
            histogram,
        } => Some(MacdReading {
            line,
            signal,
            histogram,
        }),
        _ => None,
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}
