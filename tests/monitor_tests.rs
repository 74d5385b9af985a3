//! End-to-end tests driving the scheduler through a scripted data source

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use argus::config::AppConfig;
use argus::monitor::{EngineState, MonitorEvent, MonitoringScheduler};
use argus::source::{MarketDataSource, SourceError};
use argus::types::{AlertDirection, Candle, Exchange, ExchangeQuote, Timeframe};

/// In-memory source whose quotes and candle history the tests mutate
/// between ticks.
struct ScriptedSource {
    prices: Mutex<HashMap<Exchange, f64>>,
    history: Mutex<Vec<Candle>>,
}

impl ScriptedSource {
    fn new(prices: &[(Exchange, f64)], history: Vec<Candle>) -> Arc<Self> {
        Arc::new(Self {
            prices: Mutex::new(prices.iter().cloned().collect()),
            history: Mutex::new(history),
        })
    }

    fn set_price(&self, exchange: Exchange, price: f64) {
        self.prices.lock().unwrap().insert(exchange, price);
    }

    fn drop_exchange(&self, exchange: Exchange) {
        self.prices.lock().unwrap().remove(&exchange);
    }

    fn push_candle(&self, candle: Candle) {
        self.history.lock().unwrap().push(candle);
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    async fn fetch_quote(
        &self,
        exchange: Exchange,
        symbol: &str,
    ) -> Result<ExchangeQuote, SourceError> {
        let price = self.prices.lock().unwrap().get(&exchange).copied();
        match price {
            Some(price) => Ok(ExchangeQuote {
                exchange,
                price,
                bid: price - 0.01,
                ask: price + 0.01,
                volume: 100.0,
                timestamp: 1_700_000_000_000,
            }),
            None => Err(SourceError::Exchange {
                exchange,
                message: format!("{symbol} unavailable"),
            }),
        }
    }

    async fn fetch_candles(
        &self,
        _exchange: Exchange,
        _symbol: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let history = self.history.lock().unwrap();
        let skip = history.len().saturating_sub(limit);
        Ok(history[skip..].to_vec())
    }
}

fn flat_candles(count: usize, close: f64) -> Vec<Candle> {
    (0..count)
        .map(|i| Candle {
            timestamp: i as i64 * 60_000,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        })
        .collect()
}

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.monitor.symbols = vec!["BTC/USDT".to_string()];
    config.monitor.exchanges = vec!["binance".to_string(), "coinbase".to_string()];
    config.monitor.primary_exchange = "binance".to_string();
    config.monitor.quote_interval_secs = 1;
    config.monitor.indicator_interval_secs = 1;
    config.anomaly.z_score_threshold = 2.0;
    config.arbitrage.min_profit_percentage = 0.5;
    config
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

async fn next_event(rx: &mut mpsc::Receiver<MonitorEvent>) -> MonitorEvent {
    timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn scheduler_emits_price_updates_and_indicators() {
    init_tracing();
    let source = ScriptedSource::new(
        &[(Exchange::Binance, 100.0), (Exchange::Coinbase, 100.1)],
        flat_candles(60, 100.0),
    );
    let (tx, mut rx) = mpsc::channel(256);
    let mut scheduler =
        MonitoringScheduler::new(fast_config(), source.clone(), tx).unwrap();
    scheduler.start().await.unwrap();

    let mut saw_price_update = false;
    let mut saw_indicators = false;
    for _ in 0..20 {
        match next_event(&mut rx).await {
            MonitorEvent::PriceUpdate { prices, .. } => {
                let by_exchange = &prices["BTC/USDT"];
                assert_eq!(by_exchange[&Exchange::Binance].price, 100.0);
                assert_eq!(by_exchange[&Exchange::Coinbase].price, 100.1);
                saw_price_update = true;
            }
            MonitorEvent::IndicatorsUpdate {
                symbol, indicators, ..
            } => {
                assert_eq!(symbol, "BTC/USDT");
                assert!(!indicators.rsi.is_empty());
                assert!(!indicators.bollinger.middle.is_empty());
                saw_indicators = true;
            }
            _ => {}
        }
        if saw_price_update && saw_indicators {
            break;
        }
    }
    assert!(saw_price_update && saw_indicators);

    scheduler.stop().await;
    assert_eq!(scheduler.state(), EngineState::Stopped);
}

#[tokio::test]
async fn failed_exchange_is_absent_not_zero() {
    init_tracing();
    let source = ScriptedSource::new(
        &[(Exchange::Binance, 100.0), (Exchange::Coinbase, 100.0)],
        flat_candles(30, 100.0),
    );
    source.drop_exchange(Exchange::Coinbase);

    let (tx, mut rx) = mpsc::channel(256);
    let mut scheduler =
        MonitoringScheduler::new(fast_config(), source.clone(), tx).unwrap();
    scheduler.start().await.unwrap();

    loop {
        if let MonitorEvent::PriceUpdate { prices, .. } = next_event(&mut rx).await {
            let by_exchange = &prices["BTC/USDT"];
            assert!(by_exchange.contains_key(&Exchange::Binance));
            assert!(!by_exchange.contains_key(&Exchange::Coinbase));
            break;
        }
    }
    scheduler.stop().await;
}

#[tokio::test]
async fn arbitrage_spread_reported_with_venues_ordered() {
    init_tracing();
    let source = ScriptedSource::new(
        &[(Exchange::Binance, 100.0), (Exchange::Coinbase, 101.0)],
        flat_candles(30, 100.0),
    );
    let (tx, mut rx) = mpsc::channel(256);
    let mut scheduler =
        MonitoringScheduler::new(fast_config(), source.clone(), tx).unwrap();
    scheduler.start().await.unwrap();

    loop {
        if let MonitorEvent::ArbitrageOpportunities { opportunities, .. } =
            next_event(&mut rx).await
        {
            if opportunities.is_empty() {
                continue;
            }
            assert_eq!(opportunities.len(), 1);
            let opp = &opportunities[0];
            assert_eq!(opp.buy_exchange, Exchange::Binance);
            assert_eq!(opp.sell_exchange, Exchange::Coinbase);
            assert!((opp.percentage - 0.995).abs() < 0.001);
            break;
        }
    }
    scheduler.stop().await;
}

#[tokio::test]
async fn alert_fires_once_when_price_crosses() {
    init_tracing();
    let source = ScriptedSource::new(
        &[(Exchange::Binance, 100.0), (Exchange::Coinbase, 100.0)],
        flat_candles(30, 100.0),
    );
    let (tx, mut rx) = mpsc::channel(256);
    let mut scheduler =
        MonitoringScheduler::new(fast_config(), source.clone(), tx).unwrap();
    scheduler.start().await.unwrap();

    let id = scheduler.set_alert("BTC/USDT", 105.0, AlertDirection::Above);
    assert_eq!(scheduler.active_alerts("BTC/USDT").len(), 1);

    // Below target: let a couple of ticks pass, nothing may fire
    source.set_price(Exchange::Binance, 104.0);
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, MonitorEvent::PriceAlert(_)));
    }

    // Cross the target: exactly one alert event, then silence for that id
    source.set_price(Exchange::Binance, 106.0);
    let fired = loop {
        if let MonitorEvent::PriceAlert(fired) = next_event(&mut rx).await {
            break fired;
        }
    };
    assert_eq!(fired.id, id);
    assert_eq!(fired.symbol, "BTC/USDT");
    assert_eq!(fired.current_price, 106.0);
    assert_eq!(fired.target_price, 105.0);
    assert!(scheduler.active_alerts("BTC/USDT").is_empty());

    source.set_price(Exchange::Binance, 110.0);
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, MonitorEvent::PriceAlert(_)));
    }

    scheduler.stop().await;
}

#[tokio::test]
async fn sharp_jump_emits_spike_anomaly() {
    init_tracing();
    let source = ScriptedSource::new(
        &[(Exchange::Binance, 10.0), (Exchange::Coinbase, 10.0)],
        flat_candles(20, 10.0),
    );
    let (tx, mut rx) = mpsc::channel(256);
    let mut scheduler =
        MonitoringScheduler::new(fast_config(), source.clone(), tx).unwrap();
    scheduler.start().await.unwrap();

    // A sharp jump: new in-progress bar at double the flat baseline
    source.set_price(Exchange::Binance, 20.0);
    source.push_candle(Candle {
        timestamp: 20 * 60_000,
        open: 10.0,
        high: 20.0,
        low: 10.0,
        close: 20.0,
        volume: 5.0,
    });

    let anomaly = loop {
        if let MonitorEvent::PriceAnomaly(anomaly) = next_event(&mut rx).await {
            break anomaly;
        }
    };
    assert_eq!(anomaly.symbol, "BTC/USDT");
    assert_eq!(anomaly.kind, argus::types::AnomalyKind::Spike);
    assert_eq!(anomaly.current_price, 20.0);
    assert!((anomaly.avg_price - 10.0).abs() < 1e-9);
    assert!(anomaly.z_score > 2.0);

    scheduler.stop().await;
}

#[tokio::test]
async fn stop_discards_in_flight_results() {
    init_tracing();
    let source = ScriptedSource::new(
        &[(Exchange::Binance, 100.0), (Exchange::Coinbase, 100.0)],
        flat_candles(30, 100.0),
    );
    let (tx, mut rx) = mpsc::channel(256);
    let mut scheduler =
        MonitoringScheduler::new(fast_config(), source.clone(), tx).unwrap();
    scheduler.start().await.unwrap();
    scheduler.stop().await;
    assert_eq!(scheduler.state(), EngineState::Stopped);

    // Drain whatever was emitted while running; afterwards the channel
    // stays quiet.
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(rx.try_recv().is_err());
}

#[test]
fn construction_is_sync_testable() {
    // Construction and configuration validation need no running scheduler
    let source = ScriptedSource::new(&[(Exchange::Binance, 1.0)], Vec::new());
    let quote =
        tokio_test::block_on(source.fetch_quote(Exchange::Binance, "BTC/USDT")).unwrap();
    assert_eq!(quote.price, 1.0);

    let (tx, _rx) = mpsc::channel(16);
    let scheduler = MonitoringScheduler::new(fast_config(), source, tx).unwrap();
    assert_eq!(scheduler.state(), EngineState::Stopped);
}
