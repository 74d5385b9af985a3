//! Market data source abstraction
//!
//! The engine consumes exchange connectivity through this trait; the
//! concrete adapters (REST/WebSocket clients, authentication, rate
//! limiting) live outside the crate.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::types::{Candle, Exchange, ExchangeQuote, Timeframe};

/// A failed fetch from one exchange for one symbol.
///
/// Always recovered locally as "no data for this tick"; never fatal to
/// the scheduler.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{exchange} does not list {symbol}")]
    UnknownSymbol { exchange: Exchange, symbol: String },

    #[error("fetch from {exchange} timed out after {timeout_ms}ms")]
    Timeout { exchange: Exchange, timeout_ms: u64 },

    #[error("{exchange} request failed: {message}")]
    Exchange { exchange: Exchange, message: String },

    #[error("{exchange} returned an unparseable payload: {message}")]
    Malformed { exchange: Exchange, message: String },
}

/// Abstract market data capability consumed by the scheduler
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the current quote for a symbol on one exchange
    async fn fetch_quote(
        &self,
        exchange: Exchange,
        symbol: &str,
    ) -> Result<ExchangeQuote, SourceError>;

    /// Fetch up to `limit` most recent candles, ordered oldest-first
    async fn fetch_candles(
        &self,
        exchange: Exchange,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError>;
}
