//! Argus
//!
//! Multi-exchange crypto market monitoring and signal engine: bounded
//! candle history, technical indicators, directional signal aggregation,
//! z-score anomaly detection, cross-exchange arbitrage scanning and
//! one-shot price alerts, orchestrated by a two-cadence scheduler.
//!
//! Exchange connectivity is consumed through [`source::MarketDataSource`];
//! emitted [`monitor::MonitorEvent`]s are the contract with the external
//! broadcast/notification layer.

pub mod alerts;
pub mod anomaly;
pub mod arbitrage;
pub mod config;
pub mod indicators;
pub mod monitor;
pub mod series;
pub mod signal;
pub mod source;
pub mod types;
