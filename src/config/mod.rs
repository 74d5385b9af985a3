//! Configuration management for Argus
//!
//! Loads from YAML files + environment variables via .env

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::types::{Exchange, Timeframe};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub indicators: IndicatorConfig,
    pub signal: SignalConfig,
    pub anomaly: AnomalyConfig,
    pub arbitrage: ArbitrageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Symbols to watch (e.g. "BTC/USDT")
    pub symbols: Vec<String>,
    /// Exchanges to pull quotes from
    pub exchanges: Vec<String>,
    /// Exchange whose quote drives alerts, anomalies and candle refresh
    pub primary_exchange: String,
    /// Candle timeframe (1m, 5m, 15m, 1h)
    pub timeframe: String,
    /// Fast tick interval in seconds (quotes, alerts, arbitrage)
    pub quote_interval_secs: u64,
    /// Slow tick interval in seconds (indicators, signals)
    pub indicator_interval_secs: u64,
    /// Maximum candles retained per symbol
    pub history_cap: usize,
    /// Per-fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorConfig {
    /// RSI period
    pub rsi_period: usize,
    /// MACD fast period
    pub macd_fast: usize,
    /// MACD slow period
    pub macd_slow: usize,
    /// MACD signal period
    pub macd_signal: usize,
    /// Bollinger Bands period
    pub bb_period: usize,
    /// Bollinger Bands standard deviation multiplier
    pub bb_std_dev: f64,
    /// Stochastic %K period
    pub stoch_k_period: usize,
    /// Stochastic %D period
    pub stoch_d_period: usize,
    /// ATR period
    pub atr_period: usize,
    /// Williams %R period
    pub williams_period: usize,
    /// CCI period
    pub cci_period: usize,
    /// Support/resistance local-extremum lookback
    pub sr_lookback: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    /// Bullish verdict above this bullish-vote ratio
    pub bullish_threshold: f64,
    /// Bearish verdict below this bullish-vote ratio
    pub bearish_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnomalyConfig {
    /// Z-score above which a price move is anomalous
    pub z_score_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArbitrageConfig {
    /// Minimum cross-exchange spread percent worth reporting
    pub min_profit_percentage: f64,
    /// Maximum opportunities emitted per tick, across all symbols
    pub max_opportunities: usize,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Monitor defaults
            .set_default("monitor.symbols", vec!["BTC/USDT", "ETH/USDT"])?
            .set_default("monitor.exchanges", vec!["binance", "coinbase"])?
            .set_default("monitor.primary_exchange", "binance")?
            .set_default("monitor.timeframe", "1m")?
            .set_default("monitor.quote_interval_secs", 30)?
            .set_default("monitor.indicator_interval_secs", 300)?
            .set_default("monitor.history_cap", 1000)?
            .set_default("monitor.fetch_timeout_ms", 10000)?
            // Indicator defaults
            .set_default("indicators.rsi_period", 14)?
            .set_default("indicators.macd_fast", 12)?
            .set_default("indicators.macd_slow", 26)?
            .set_default("indicators.macd_signal", 9)?
            .set_default("indicators.bb_period", 20)?
            .set_default("indicators.bb_std_dev", 2.0)?
            .set_default("indicators.stoch_k_period", 14)?
            .set_default("indicators.stoch_d_period", 3)?
            .set_default("indicators.atr_period", 14)?
            .set_default("indicators.williams_period", 14)?
            .set_default("indicators.cci_period", 20)?
            .set_default("indicators.sr_lookback", 20)?
            // Signal defaults
            .set_default("signal.bullish_threshold", 0.6)?
            .set_default("signal.bearish_threshold", 0.4)?
            // Anomaly defaults
            .set_default("anomaly.z_score_threshold", 5.0)?
            // Arbitrage defaults
            .set_default("arbitrage.min_profit_percentage", 0.1)?
            .set_default("arbitrage.max_opportunities", 10)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (ARGUS_*)
            .add_source(Environment::with_prefix("ARGUS").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Validate the configuration; invalid values are fatal at start-up
    pub fn validate(&self) -> Result<()> {
        if self.monitor.symbols.is_empty() {
            bail!("monitor.symbols must not be empty");
        }
        if self.monitor.exchanges.len() < 2 {
            bail!("monitor.exchanges needs at least two entries for arbitrage scanning");
        }
        for name in &self.monitor.exchanges {
            if Exchange::parse(name).is_none() {
                bail!("Unknown exchange in monitor.exchanges: {}", name);
            }
        }
        if Exchange::parse(&self.monitor.primary_exchange).is_none() {
            bail!(
                "Unknown exchange in monitor.primary_exchange: {}",
                self.monitor.primary_exchange
            );
        }
        if !self
            .monitor
            .exchanges
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&self.monitor.primary_exchange))
        {
            bail!(
                "monitor.primary_exchange {} is not in monitor.exchanges",
                self.monitor.primary_exchange
            );
        }
        if Timeframe::parse(&self.monitor.timeframe).is_none() {
            bail!("Unknown timeframe: {}", self.monitor.timeframe);
        }
        if self.monitor.quote_interval_secs == 0 || self.monitor.indicator_interval_secs == 0 {
            bail!("Tick intervals must be greater than zero");
        }
        if self.monitor.history_cap == 0 {
            bail!("monitor.history_cap must be greater than zero");
        }
        if self.monitor.fetch_timeout_ms == 0 {
            bail!("monitor.fetch_timeout_ms must be greater than zero");
        }

        let periods = [
            ("rsi_period", self.indicators.rsi_period),
            ("macd_fast", self.indicators.macd_fast),
            ("macd_slow", self.indicators.macd_slow),
            ("macd_signal", self.indicators.macd_signal),
            ("bb_period", self.indicators.bb_period),
            ("stoch_k_period", self.indicators.stoch_k_period),
            ("stoch_d_period", self.indicators.stoch_d_period),
            ("atr_period", self.indicators.atr_period),
            ("williams_period", self.indicators.williams_period),
            ("cci_period", self.indicators.cci_period),
            ("sr_lookback", self.indicators.sr_lookback),
        ];
        for (name, value) in periods {
            if value == 0 {
                bail!("indicators.{} must be greater than zero", name);
            }
        }
        if self.indicators.macd_fast >= self.indicators.macd_slow {
            bail!(
                "indicators.macd_fast ({}) must be less than macd_slow ({})",
                self.indicators.macd_fast,
                self.indicators.macd_slow
            );
        }
        if self.indicators.bb_std_dev <= 0.0 {
            bail!("indicators.bb_std_dev must be positive");
        }

        if !(0.0..=1.0).contains(&self.signal.bullish_threshold)
            || !(0.0..=1.0).contains(&self.signal.bearish_threshold)
        {
            bail!("Signal thresholds must lie in [0, 1]");
        }
        if self.signal.bearish_threshold >= self.signal.bullish_threshold {
            bail!(
                "signal.bearish_threshold ({}) must be below bullish_threshold ({})",
                self.signal.bearish_threshold,
                self.signal.bullish_threshold
            );
        }

        if self.anomaly.z_score_threshold <= 0.0 {
            bail!("anomaly.z_score_threshold must be positive");
        }
        if self.arbitrage.min_profit_percentage < 0.0 {
            bail!("arbitrage.min_profit_percentage must not be negative");
        }
        if self.arbitrage.max_opportunities == 0 {
            bail!("arbitrage.max_opportunities must be greater than zero");
        }

        Ok(())
    }

    /// Parsed exchange list (call after validate)
    pub fn exchange_list(&self) -> Vec<Exchange> {
        self.monitor
            .exchanges
            .iter()
            .filter_map(|e| Exchange::parse(e))
            .collect()
    }

    /// Parsed primary exchange (call after validate)
    pub fn primary_exchange(&self) -> Option<Exchange> {
        Exchange::parse(&self.monitor.primary_exchange)
    }

    /// Parsed timeframe (call after validate)
    pub fn timeframe(&self) -> Option<Timeframe> {
        Timeframe::parse(&self.monitor.timeframe)
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "symbols={:?} exchanges={:?} primary={} tf={} quote_tick={}s indicator_tick={}s",
            self.monitor.symbols,
            self.monitor.exchanges,
            self.monitor.primary_exchange,
            self.monitor.timeframe,
            self.monitor.quote_interval_secs,
            self.monitor.indicator_interval_secs
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig {
                symbols: vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()],
                exchanges: vec!["binance".to_string(), "coinbase".to_string()],
                primary_exchange: "binance".to_string(),
                timeframe: "1m".to_string(),
                quote_interval_secs: 30,
                indicator_interval_secs: 300,
                history_cap: 1000,
                fetch_timeout_ms: 10000,
            },
            indicators: IndicatorConfig::default(),
            signal: SignalConfig {
                bullish_threshold: 0.6,
                bearish_threshold: 0.4,
            },
            anomaly: AnomalyConfig {
                z_score_threshold: 5.0,
            },
            arbitrage: ArbitrageConfig {
                min_profit_percentage: 0.1,
                max_opportunities: 10,
            },
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
            stoch_k_period: 14,
            stoch_d_period: 3,
            atr_period: 14,
            williams_period: 14,
            cci_period: 20,
            sr_lookback: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.primary_exchange(), Some(Exchange::Binance));
        assert_eq!(config.timeframe(), Some(Timeframe::Min1));
        assert_eq!(config.exchange_list().len(), 2);
    }

    #[test]
    fn test_validate_rejects_unknown_exchange() {
        let mut config = AppConfig::default();
        config.monitor.exchanges = vec!["binance".to_string(), "mtgox".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_primary_outside_list() {
        let mut config = AppConfig::default();
        config.monitor.primary_exchange = "kraken".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_periods() {
        let mut config = AppConfig::default();
        config.indicators.rsi_period = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.indicators.macd_fast = 26;
        config.indicators.macd_slow = 12;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_signal_thresholds() {
        let mut config = AppConfig::default();
        config.signal.bullish_threshold = 0.3;
        config.signal.bearish_threshold = 0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_symbols() {
        let mut config = AppConfig::default();
        config.monitor.symbols.clear();
        assert!(config.validate().is_err());
    }
}
