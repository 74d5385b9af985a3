//! Bounded per-symbol candle history
//!
//! Append-only sliding window of OHLCV candles. The last bar is mutable
//! (in-progress bar updates replace it); everything older is immutable.

use std::collections::VecDeque;

use crate::types::Candle;

/// Bounded, append-only time series of candles for one symbol
#[derive(Debug, Clone)]
pub struct CandleSeries {
    candles: VecDeque<Candle>,
    cap: usize,
}

impl CandleSeries {
    pub fn new(cap: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(cap.min(1024)),
            cap,
        }
    }

    /// Append a candle, enforcing monotonic timestamps.
    ///
    /// A strictly newer timestamp appends; the same timestamp as the last
    /// stored bar replaces it (in-progress bar update); an older timestamp
    /// is dropped and logged, never merged.
    pub fn append(&mut self, candle: Candle) {
        match self.candles.back() {
            Some(last) if candle.timestamp < last.timestamp => {
                tracing::debug!(
                    incoming_ts = candle.timestamp,
                    last_ts = last.timestamp,
                    "Dropping out-of-order candle"
                );
                return;
            }
            Some(last) if candle.timestamp == last.timestamp => {
                *self.candles.back_mut().unwrap() = candle;
                return;
            }
            _ => {}
        }

        self.candles.push_back(candle);
        while self.candles.len() > self.cap {
            self.candles.pop_front();
        }
    }

    /// Seed the series from backfilled history (ordered oldest-first)
    pub fn seed(&mut self, candles: Vec<Candle>) {
        for candle in candles {
            self.append(candle);
        }
    }

    /// Last `n` candles, oldest-first
    pub fn latest(&self, n: usize) -> Vec<Candle> {
        let skip = self.candles.len().saturating_sub(n);
        self.candles.iter().skip(skip).cloned().collect()
    }

    /// All candles, oldest-first
    pub fn all(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }

    /// Close prices, oldest-first
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// High prices, oldest-first
    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    /// Low prices, oldest-first
    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Timestamp of the most recent candle
    pub fn last_timestamp(&self) -> Option<i64> {
        self.candles.back().map(|c| c.timestamp)
    }
}
