//! RSI (Relative Strength Index) indicator implementation.
//!
//! Average gain/loss are the simple rolling means of the last n price
//! changes (no recursive smoothing):
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0 and avg_gain > 0: RSI = 100.
//! If both are zero the ratio is undefined and the point is invalid.
//!
//! Warmup: first n bars are invalid (need n price changes to fill the window).

use std::collections::VecDeque;

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

/// Lazy RSI over a bar slice. Yields exactly one point per bar, in order;
/// once exhausted it cannot be restarted.
pub struct RsiIter<'a> {
    bars: &'a [PriceBar],
    period: usize,
    pos: usize,
    window: VecDeque<(f64, f64)>,
}

impl<'a> RsiIter<'a> {
    pub fn new(bars: &'a [PriceBar], period: usize) -> Self {
        RsiIter {
            bars,
            period,
            pos: 0,
            window: VecDeque::with_capacity(period + 1),
        }
    }

    fn invalid(&self, i: usize) -> IndicatorPoint {
        IndicatorPoint {
            date: self.bars[i].date,
            valid: false,
            value: IndicatorValue::Simple(0.0),
        }
    }
}

impl Iterator for RsiIter<'_> {
    type Item = IndicatorPoint;

    fn next(&mut self) -> Option<IndicatorPoint> {
        let i = self.pos;
        if i >= self.bars.len() {
            return None;
        }
        self.pos += 1;

        if i == 0 || self.period == 0 {
            return Some(self.invalid(i));
        }

        let change = self.bars[i].close - self.bars[i - 1].close;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        self.window.push_back((gain, loss));
        if self.window.len() > self.period {
            self.window.pop_front();
        }

        if self.window.len() < self.period {
            return Some(self.invalid(i));
        }

        // Summed fresh each bar so a flat window compares exactly against zero.
        let (gains, losses) = self
            .window
            .iter()
            .fold((0.0, 0.0), |(g, l), &(wg, wl)| (g + wg, l + wl));

        let avg_gain = gains / self.period as f64;
        let avg_loss = losses / self.period as f64;
        let rsi = if avg_loss == 0.0 {
            if avg_gain == 0.0 {
                return Some(self.invalid(i));
            }
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };

        Some(IndicatorPoint {
            date: self.bars[i].date,
            valid: true,
            value: IndicatorValue::Simple(rsi),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bars.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RsiIter<'_> {}

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values: RsiIter::new(bars, period).collect(),
    }
}
