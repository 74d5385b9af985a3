//! Core types used throughout Argus
//!
//! Defines common data structures for candles, quotes, signals, anomalies,
//! arbitrage opportunities and price alerts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Binance,
    Bybit,
    Coinbase,
    Kraken,
}

impl Exchange {
    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "binance" => Some(Exchange::Binance),
            "bybit" => Some(Exchange::Bybit),
            "coinbase" => Some(Exchange::Coinbase),
            "kraken" => Some(Exchange::Kraken),
            _ => None,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Binance => write!(f, "Binance"),
            Exchange::Bybit => write!(f, "Bybit"),
            Exchange::Coinbase => write!(f, "Coinbase"),
            Exchange::Kraken => write!(f, "Kraken"),
        }
    }
}

/// Supported timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Min1,
    Min5,
    Min15,
    Hour1,
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Min1
    }
}

impl Timeframe {
    /// Get duration in seconds
    pub fn duration_secs(&self) -> u64 {
        match self {
            Timeframe::Min1 => 60,
            Timeframe::Min5 => 5 * 60,
            Timeframe::Min15 => 15 * 60,
            Timeframe::Hour1 => 60 * 60,
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "1m" | "1min" => Some(Timeframe::Min1),
            "5m" | "5min" => Some(Timeframe::Min5),
            "15m" | "15min" => Some(Timeframe::Min15),
            "1h" | "1hour" => Some(Timeframe::Hour1),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Min1 => write!(f, "1m"),
            Timeframe::Min5 => write!(f, "5m"),
            Timeframe::Min15 => write!(f, "15m"),
            Timeframe::Hour1 => write!(f, "1h"),
        }
    }
}

/// Candlestick data (one fixed-duration OHLCV bar)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds
    pub timestamp: i64,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume in base currency
    pub volume: f64,
}

/// Quote from one exchange (top of book plus last price)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    /// Exchange this quote came from
    pub exchange: Exchange,
    /// Last traded price
    pub price: f64,
    /// Best bid
    pub bid: f64,
    /// Best ask
    pub ask: f64,
    /// 24h volume in base currency
    pub volume: f64,
    /// Timestamp in milliseconds
    pub timestamp: i64,
}

/// Overall signal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDirection::Bullish => write!(f, "BULLISH"),
            SignalDirection::Bearish => write!(f, "BEARISH"),
            SignalDirection::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Per-indicator vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Buy => write!(f, "BUY"),
            Vote::Sell => write!(f, "SELL"),
            Vote::Hold => write!(f, "HOLD"),
        }
    }
}

/// One indicator's contribution to a signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalComponent {
    /// Indicator name (e.g. "RSI")
    pub indicator: String,
    /// Vote direction
    pub direction: Vote,
    /// Human-readable reason
    pub reason: String,
}

/// Aggregated directional signal derived from one IndicatorSet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Overall verdict
    pub overall: SignalDirection,
    /// Confidence strength in [0, 1]
    pub strength: f64,
    /// Ordered per-indicator votes
    pub components: Vec<SignalComponent>,
}

/// Anomaly classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnomalyKind {
    Spike,
    Drop,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyKind::Spike => write!(f, "SPIKE"),
            AnomalyKind::Drop => write!(f, "DROP"),
        }
    }
}

/// Anomaly severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnomalySeverity {
    Medium,
    High,
}

impl fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalySeverity::Medium => write!(f, "MEDIUM"),
            AnomalySeverity::High => write!(f, "HIGH"),
        }
    }
}

/// Statistical price anomaly, computed and emitted per tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    /// Symbol the anomaly was detected on
    pub symbol: String,
    /// Close price that triggered the detection
    pub current_price: f64,
    /// Rolling baseline mean
    pub avg_price: f64,
    /// Standard deviations from the baseline
    pub z_score: f64,
    /// Spike or drop
    pub kind: AnomalyKind,
    /// Severity bucket
    pub severity: AnomalySeverity,
    /// Timestamp in milliseconds
    pub timestamp: i64,
}

/// Cross-exchange arbitrage opportunity, recomputed every tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    /// Symbol
    pub symbol: String,
    /// Cheaper venue
    pub buy_exchange: Exchange,
    /// Pricier venue
    pub sell_exchange: Exchange,
    /// Price at the buy venue
    pub buy_price: f64,
    /// Price at the sell venue
    pub sell_price: f64,
    /// Absolute price gap
    pub price_difference: f64,
    /// Gap as percent of the pair average
    pub percentage: f64,
    /// Timestamp in milliseconds
    pub timestamp: i64,
}

/// Alert trigger direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertDirection {
    Above,
    Below,
}

impl fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertDirection::Above => write!(f, "ABOVE"),
            AlertDirection::Below => write!(f, "BELOW"),
        }
    }
}

/// User-defined price threshold watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAlert {
    /// Generated id (uuid v4)
    pub id: String,
    /// Symbol being watched
    pub symbol: String,
    /// Threshold price
    pub target_price: f64,
    /// Trigger when price crosses above or below the target
    pub direction: AlertDirection,
    /// Creation timestamp in milliseconds
    pub created_at: i64,
    /// Whether the alert has fired (terminal)
    pub triggered: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_parse_roundtrip() {
        for ex in [
            Exchange::Binance,
            Exchange::Bybit,
            Exchange::Coinbase,
            Exchange::Kraken,
        ] {
            assert_eq!(Exchange::parse(&ex.to_string()), Some(ex));
        }
        assert_eq!(Exchange::parse("ftx"), None);
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!(Timeframe::parse("1m"), Some(Timeframe::Min1));
        assert_eq!(Timeframe::parse("1H"), Some(Timeframe::Hour1));
        assert_eq!(Timeframe::parse("2d"), None);
        assert_eq!(Timeframe::Min15.duration_secs(), 900);
    }

    #[test]
    fn test_enum_serde_casing() {
        let json = serde_json::to_string(&AnomalyKind::Spike).unwrap();
        assert_eq!(json, "\"SPIKE\"");
        let json = serde_json::to_string(&AlertDirection::Below).unwrap();
        assert_eq!(json, "\"BELOW\"");
        let json = serde_json::to_string(&SignalDirection::Bullish).unwrap();
        assert_eq!(json, "\"BULLISH\"");
    }
}
