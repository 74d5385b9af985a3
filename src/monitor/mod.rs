//! Monitoring scheduler - The orchestrator
//!
//! Owns every per-symbol candle series and the active alert map. Runs two
//! independent periodic loops: a fast tick (quotes, alerts, anomalies,
//! arbitrage) and a slow tick (full indicator battery + signal). Emits
//! typed events consumed by the external broadcast/notification layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::alerts::{AlertFired, AlertRegistry};
use crate::anomaly::AnomalyDetector;
use crate::arbitrage::ArbitrageScanner;
use crate::config::{AppConfig, IndicatorConfig, SignalConfig};
use crate::indicators::IndicatorSet;
use crate::series::CandleSeries;
use crate::signal;
use crate::source::{MarketDataSource, SourceError};
use crate::types::{
    AlertDirection, Anomaly, ArbitrageOpportunity, Exchange, ExchangeQuote, PriceAlert, Signal,
    Timeframe,
};

/// Candles re-fetched from the primary exchange on every fast tick: the
/// in-progress bar plus the bar that may have just closed.
const CANDLE_REFRESH_LIMIT: usize = 2;

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "STOPPED"),
            EngineState::Starting => write!(f, "STARTING"),
            EngineState::Running => write!(f, "RUNNING"),
            EngineState::Stopping => write!(f, "STOPPING"),
        }
    }
}

/// Events emitted to the external broadcast layer.
///
/// The serde tag values are the wire contract: `price_update`,
/// `indicators_update`, `arbitrage_opportunities`, `price_alert`,
/// `price_anomaly`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    PriceUpdate {
        timestamp: i64,
        /// Only successfully fetched quotes are included
        prices: HashMap<String, HashMap<Exchange, ExchangeQuote>>,
    },
    IndicatorsUpdate {
        symbol: String,
        indicators: IndicatorSet,
        signal: Signal,
        timestamp: i64,
    },
    ArbitrageOpportunities {
        timestamp: i64,
        opportunities: Vec<ArbitrageOpportunity>,
    },
    PriceAlert(AlertFired),
    PriceAnomaly(Anomaly),
}

/// State shared between the scheduler handle and its tick loops
struct SharedState {
    /// Per-symbol series behind their own locks: single writer per
    /// symbol, cross-symbol parallelism
    series: RwLock<HashMap<String, Arc<Mutex<CandleSeries>>>>,
    alerts: Mutex<AlertRegistry>,
    state: RwLock<EngineState>,
}

/// Everything a tick needs, cloned into the spawned loops
struct TickContext {
    source: Arc<dyn MarketDataSource>,
    shared: Arc<SharedState>,
    events: mpsc::Sender<MonitorEvent>,
    exchanges: Vec<Exchange>,
    primary: Exchange,
    timeframe: Timeframe,
    fetch_timeout: Duration,
    detector: AnomalyDetector,
    scanner: ArbitrageScanner,
    indicator_config: IndicatorConfig,
    signal_config: SignalConfig,
}

/// The monitoring scheduler.
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`. Owns all
/// candle series and active alerts exclusively; everything else it
/// produces is a value handed to the event channel.
pub struct MonitoringScheduler {
    config: AppConfig,
    ctx: Arc<TickContext>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl MonitoringScheduler {
    /// Build a scheduler. Configuration errors are fatal here, before
    /// anything starts ticking.
    pub fn new(
        config: AppConfig,
        source: Arc<dyn MarketDataSource>,
        events: mpsc::Sender<MonitorEvent>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let exchanges = config.exchange_list();
        let primary = config
            .primary_exchange()
            .context("Unparseable primary exchange")?;
        let timeframe = config.timeframe().context("Unparseable timeframe")?;

        let shared = Arc::new(SharedState {
            series: RwLock::new(HashMap::new()),
            alerts: Mutex::new(AlertRegistry::new()),
            state: RwLock::new(EngineState::Stopped),
        });

        let ctx = Arc::new(TickContext {
            source,
            shared,
            events,
            exchanges,
            primary,
            timeframe,
            fetch_timeout: Duration::from_millis(config.monitor.fetch_timeout_ms),
            detector: AnomalyDetector::new(config.anomaly.z_score_threshold),
            scanner: ArbitrageScanner::new(
                config.arbitrage.min_profit_percentage,
                config.arbitrage.max_opportunities,
            ),
            indicator_config: config.indicators.clone(),
            signal_config: config.signal.clone(),
        });

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            ctx,
            shutdown_tx,
            handles: Vec::new(),
        })
    }

    /// Current engine state
    pub fn state(&self) -> EngineState {
        read_state(&self.ctx.shared.state)
    }

    /// Symbols currently monitored
    pub fn watched_symbols(&self) -> Vec<String> {
        self.ctx
            .shared
            .series
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Candle count for one symbol (health reporting)
    pub fn series_len(&self, symbol: &str) -> Option<usize> {
        let map = self.ctx.shared.series.read().ok()?;
        let series = map.get(symbol)?;
        series.lock().ok().map(|s| s.len())
    }

    /// Create a price alert; returns its id
    pub fn set_alert(&self, symbol: &str, target_price: f64, direction: AlertDirection) -> String {
        match self.ctx.shared.alerts.lock() {
            Ok(mut alerts) => alerts.set(symbol, target_price, direction),
            Err(poisoned) => poisoned.into_inner().set(symbol, target_price, direction),
        }
    }

    /// Remove a price alert by id
    pub fn remove_alert(&self, id: &str) -> bool {
        match self.ctx.shared.alerts.lock() {
            Ok(mut alerts) => alerts.remove(id),
            Err(poisoned) => poisoned.into_inner().remove(id),
        }
    }

    /// Active alerts for one symbol
    pub fn active_alerts(&self, symbol: &str) -> Vec<PriceAlert> {
        self.ctx
            .shared
            .alerts
            .lock()
            .map(|a| a.active(symbol))
            .unwrap_or_default()
    }

    /// Backfill every watched symbol, then start both tick loops.
    pub async fn start(&mut self) -> Result<()> {
        if read_state(&self.ctx.shared.state) != EngineState::Stopped {
            bail!("Scheduler is already running");
        }
        set_state(&self.ctx.shared.state, EngineState::Starting);
        tracing::info!(config = %self.config.digest(), "Starting market monitor");

        for symbol in self.config.monitor.symbols.clone() {
            self.add_symbol(&symbol).await;
        }

        // Reset the shutdown flag in case of a previous start/stop cycle
        self.shutdown_tx.send_replace(false);

        let quote_ctx = self.ctx.clone();
        let mut quote_shutdown = self.shutdown_tx.subscribe();
        let quote_secs = self.config.monitor.quote_interval_secs;
        self.handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(quote_secs));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        run_quote_tick(&quote_ctx).await;
                    }
                    _ = quote_shutdown.changed() => {
                        if *quote_shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Quote loop stopped");
        }));

        let indicator_ctx = self.ctx.clone();
        let mut indicator_shutdown = self.shutdown_tx.subscribe();
        let indicator_secs = self.config.monitor.indicator_interval_secs;
        self.handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(indicator_secs));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        run_indicator_tick(&indicator_ctx).await;
                    }
                    _ = indicator_shutdown.changed() => {
                        if *indicator_shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Indicator loop stopped");
        }));

        set_state(&self.ctx.shared.state, EngineState::Running);
        tracing::info!(
            symbols = ?self.watched_symbols(),
            quote_interval_secs = quote_secs,
            indicator_interval_secs = indicator_secs,
            "Market monitor running"
        );
        Ok(())
    }

    /// Stop both loops. In-flight fetches complete and their results are
    /// discarded; no event is emitted once stopping.
    pub async fn stop(&mut self) {
        if read_state(&self.ctx.shared.state) != EngineState::Running {
            return;
        }
        set_state(&self.ctx.shared.state, EngineState::Stopping);
        let _ = self.shutdown_tx.send(true);

        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }

        set_state(&self.ctx.shared.state, EngineState::Stopped);
        tracing::info!("Market monitor stopped");
    }

    /// Start watching a symbol at runtime: backfill a bounded history and
    /// register its series without disturbing other symbols. Backfill
    /// failure is tolerated; the series then fills from live ticks.
    pub async fn add_symbol(&self, symbol: &str) {
        {
            let already = self
                .ctx
                .shared
                .series
                .read()
                .map(|m| m.contains_key(symbol))
                .unwrap_or(false);
            if already {
                tracing::debug!(symbol = %symbol, "Symbol already watched");
                return;
            }
        }

        let mut series = CandleSeries::new(self.config.monitor.history_cap);
        match self
            .ctx
            .source
            .fetch_candles(
                self.ctx.primary,
                symbol,
                self.ctx.timeframe,
                self.config.monitor.history_cap,
            )
            .await
        {
            Ok(candles) => {
                tracing::info!(
                    symbol = %symbol,
                    exchange = %self.ctx.primary,
                    count = candles.len(),
                    "Backfilled candle history"
                );
                series.seed(candles);
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %symbol,
                    exchange = %self.ctx.primary,
                    error = %e,
                    "Backfill failed, starting with empty history"
                );
            }
        }

        if let Ok(mut map) = self.ctx.shared.series.write() {
            map.insert(symbol.to_string(), Arc::new(Mutex::new(series)));
        }
    }

    /// Stop watching a symbol: tear down its series and alerts
    pub fn remove_symbol(&self, symbol: &str) -> bool {
        let removed = self
            .ctx
            .shared
            .series
            .write()
            .map(|mut m| m.remove(symbol).is_some())
            .unwrap_or(false);
        if removed {
            if let Ok(mut alerts) = self.ctx.shared.alerts.lock() {
                alerts.remove_symbol(symbol);
            }
            tracing::info!(symbol = %symbol, "Symbol removed from watch list");
        }
        removed
    }
}

fn read_state(state: &RwLock<EngineState>) -> EngineState {
    state.read().map(|s| *s).unwrap_or(EngineState::Stopped)
}

fn set_state(state: &RwLock<EngineState>, value: EngineState) {
    if let Ok(mut s) = state.write() {
        *s = value;
    }
}

fn snapshot_symbols(shared: &SharedState) -> Vec<(String, Arc<Mutex<CandleSeries>>)> {
    shared
        .series
        .read()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

async fn emit(ctx: &TickContext, event: MonitorEvent) {
    if ctx.events.send(event).await.is_err() {
        tracing::warn!("Event channel closed, dropping event");
    }
}

/// Fast tick: quote snapshot fan-out, candle refresh, alerts, anomalies,
/// arbitrage.
async fn run_quote_tick(ctx: &Arc<TickContext>) {
    let entries = snapshot_symbols(&ctx.shared);
    if entries.is_empty() {
        return;
    }
    let symbols: Vec<String> = entries.iter().map(|(s, _)| s.clone()).collect();

    // Per-symbol, per-exchange fan-out; each branch resolves to a Result,
    // never a panic or a tick abort.
    let mut fetches = Vec::with_capacity(symbols.len() * ctx.exchanges.len());
    for symbol in &symbols {
        for &exchange in &ctx.exchanges {
            let source = ctx.source.clone();
            let symbol = symbol.clone();
            let timeout = ctx.fetch_timeout;
            fetches.push(async move {
                let result = match tokio::time::timeout(
                    timeout,
                    source.fetch_quote(exchange, &symbol),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout {
                        exchange,
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                };
                (symbol, exchange, result)
            });
        }
    }
    let quote_results = join_all(fetches).await;

    let candle_fetches = symbols.iter().map(|symbol| {
        let source = ctx.source.clone();
        let symbol = symbol.clone();
        let timeout = ctx.fetch_timeout;
        let primary = ctx.primary;
        let timeframe = ctx.timeframe;
        async move {
            let result = match tokio::time::timeout(
                timeout,
                source.fetch_candles(primary, &symbol, timeframe, CANDLE_REFRESH_LIMIT),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout {
                    exchange: primary,
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };
            (symbol, result)
        }
    });
    let candle_results = join_all(candle_fetches).await;

    // Shutting down: discard everything fetched in flight
    if read_state(&ctx.shared.state) != EngineState::Running {
        tracing::debug!("Tick results discarded, scheduler not running");
        return;
    }

    let timestamp = Utc::now().timestamp_millis();

    let mut prices: HashMap<String, HashMap<Exchange, ExchangeQuote>> = HashMap::new();
    for (symbol, exchange, result) in quote_results {
        match result {
            Ok(quote) => {
                prices.entry(symbol).or_default().insert(exchange, quote);
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %symbol,
                    exchange = %exchange,
                    error = %e,
                    "Quote fetch failed, no quote this tick"
                );
            }
        }
    }

    for (symbol, result) in candle_results {
        match result {
            Ok(candles) => {
                if let Some(series) = lookup_series(&ctx.shared, &symbol) {
                    if let Ok(mut series) = series.lock() {
                        for candle in candles {
                            series.append(candle);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %symbol,
                    exchange = %ctx.primary,
                    error = %e,
                    "Candle refresh failed this tick"
                );
            }
        }
    }

    // Alerts and anomalies run off the primary exchange's quote; a symbol
    // without one this tick is skipped, not errored.
    for (symbol, series) in &entries {
        let Some(primary_quote) = prices.get(symbol).and_then(|m| m.get(&ctx.primary)) else {
            tracing::debug!(
                symbol = %symbol,
                exchange = %ctx.primary,
                "No primary quote, skipping alert/anomaly checks"
            );
            continue;
        };

        let fired = match ctx.shared.alerts.lock() {
            Ok(mut alerts) => alerts.check(symbol, primary_quote.price, timestamp),
            Err(_) => Vec::new(),
        };
        for alert in fired {
            emit(ctx, MonitorEvent::PriceAlert(alert)).await;
        }

        let closes = match series.lock() {
            Ok(series) => series.closes(),
            Err(_) => continue,
        };
        if let Some(anomaly) = ctx.detector.check(symbol, &closes, timestamp) {
            emit(ctx, MonitorEvent::PriceAnomaly(anomaly)).await;
        }
    }

    let mut opportunities: Vec<ArbitrageOpportunity> = Vec::new();
    for (symbol, quotes) in &prices {
        opportunities.extend(ctx.scanner.scan(symbol, quotes, timestamp));
    }
    let opportunities = ctx.scanner.rank(opportunities);

    emit(
        ctx,
        MonitorEvent::PriceUpdate {
            timestamp,
            prices,
        },
    )
    .await;
    emit(
        ctx,
        MonitorEvent::ArbitrageOpportunities {
            timestamp,
            opportunities,
        },
    )
    .await;
}

/// Slow tick: full indicator battery and signal per watched symbol.
async fn run_indicator_tick(ctx: &Arc<TickContext>) {
    let entries = snapshot_symbols(&ctx.shared);
    let timestamp = Utc::now().timestamp_millis();

    for (symbol, series) in entries {
        let (set, closes) = match series.lock() {
            Ok(series) => {
                if series.is_empty() {
                    tracing::debug!(symbol = %symbol, "No candles yet, skipping indicators");
                    continue;
                }
                (
                    IndicatorSet::compute(&series, &ctx.indicator_config),
                    series.closes(),
                )
            }
            Err(_) => continue,
        };

        if read_state(&ctx.shared.state) != EngineState::Running {
            return;
        }

        if set.rsi.is_empty() || set.macd.histogram.is_empty() || set.bollinger.middle.is_empty() {
            tracing::debug!(
                symbol = %symbol,
                candles = closes.len(),
                "Insufficient history for part of the indicator battery"
            );
        }

        let signal = signal::aggregate(&set, &closes, &ctx.signal_config);
        tracing::debug!(
            symbol = %symbol,
            overall = %signal.overall,
            strength = signal.strength,
            candles = closes.len(),
            "Indicators recomputed"
        );

        emit(
            ctx,
            MonitorEvent::IndicatorsUpdate {
                symbol,
                indicators: set,
                signal,
                timestamp,
            },
        )
        .await;
    }
}

fn lookup_series(shared: &SharedState, symbol: &str) -> Option<Arc<Mutex<CandleSeries>>> {
    shared.series.read().ok()?.get(symbol).cloned()
}
