//! Price alerts - One-shot threshold watches per symbol
//!
//! Alerts live in an active set until they fire, then are pruned; they
//! never re-arm. Firing returns typed records for the scheduler to emit
//! on the event channel, which keeps it synchronously testable and
//! decouples firing from delivery.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::{AlertDirection, PriceAlert};

/// Emitted once when an alert fires
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertFired {
    pub id: String,
    pub symbol: String,
    pub current_price: f64,
    pub target_price: f64,
    pub direction: AlertDirection,
    pub timestamp: i64,
}

/// Registry of active price alerts, keyed by symbol
#[derive(Debug, Default)]
pub struct AlertRegistry {
    alerts: HashMap<String, Vec<PriceAlert>>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an alert and return its generated id.
    ///
    /// Multiple alerts may coexist per symbol.
    pub fn set(&mut self, symbol: &str, target_price: f64, direction: AlertDirection) -> String {
        let id = Uuid::new_v4().to_string();
        let alert = PriceAlert {
            id: id.clone(),
            symbol: symbol.to_string(),
            target_price,
            direction,
            created_at: Utc::now().timestamp_millis(),
            triggered: false,
        };

        tracing::info!(
            symbol = %symbol,
            id = %id,
            target = target_price,
            direction = %direction,
            "Price alert set"
        );

        self.alerts.entry(symbol.to_string()).or_default().push(alert);
        id
    }

    /// Delete an alert by id, scanning across all symbols
    pub fn remove(&mut self, id: &str) -> bool {
        for alerts in self.alerts.values_mut() {
            if let Some(pos) = alerts.iter().position(|a| a.id == id) {
                alerts.remove(pos);
                return true;
            }
        }
        false
    }

    /// Evaluate all active alerts for a symbol against the reference price.
    ///
    /// An alert fires when `Above: price >= target` or
    /// `Below: price <= target`. Fired alerts are pruned immediately and
    /// never fire again.
    pub fn check(&mut self, symbol: &str, price: f64, timestamp: i64) -> Vec<AlertFired> {
        let Some(alerts) = self.alerts.get_mut(symbol) else {
            return Vec::new();
        };

        let mut fired = Vec::new();
        alerts.retain(|alert| {
            let hit = match alert.direction {
                AlertDirection::Above => price >= alert.target_price,
                AlertDirection::Below => price <= alert.target_price,
            };
            if hit {
                tracing::info!(
                    symbol = %symbol,
                    id = %alert.id,
                    price = price,
                    target = alert.target_price,
                    direction = %alert.direction,
                    "Price alert fired"
                );
                fired.push(AlertFired {
                    id: alert.id.clone(),
                    symbol: alert.symbol.clone(),
                    current_price: price,
                    target_price: alert.target_price,
                    direction: alert.direction,
                    timestamp,
                });
            }
            !hit
        });

        if alerts.is_empty() {
            self.alerts.remove(symbol);
        }
        fired
    }

    /// Active alerts for one symbol
    pub fn active(&self, symbol: &str) -> Vec<PriceAlert> {
        self.alerts.get(symbol).cloned().unwrap_or_default()
    }

    /// Total active alerts across all symbols
    pub fn len(&self) -> usize {
        self.alerts.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every alert for a symbol (watched-symbol teardown)
    pub fn remove_symbol(&mut self, symbol: &str) {
        self.alerts.remove(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_fires_once_then_pruned() {
        let mut registry = AlertRegistry::new();
        let id = registry.set("BTC/USDT", 100.0, AlertDirection::Above);

        // Below target: nothing fires, alert stays active
        assert!(registry.check("BTC/USDT", 99.0, 0).is_empty());
        assert_eq!(registry.active("BTC/USDT").len(), 1);

        // At target: exactly one event
        let fired = registry.check("BTC/USDT", 100.0, 10);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, id);
        assert_eq!(fired[0].current_price, 100.0);
        assert_eq!(fired[0].target_price, 100.0);
        assert_eq!(fired[0].timestamp, 10);

        // Past target: never re-fires
        assert!(registry.check("BTC/USDT", 101.0, 20).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_below_direction() {
        let mut registry = AlertRegistry::new();
        registry.set("ETH/USDT", 50.0, AlertDirection::Below);

        assert!(registry.check("ETH/USDT", 51.0, 0).is_empty());
        let fired = registry.check("ETH/USDT", 49.5, 0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].direction, AlertDirection::Below);
    }

    #[test]
    fn test_multiple_alerts_per_symbol() {
        let mut registry = AlertRegistry::new();
        registry.set("BTC/USDT", 100.0, AlertDirection::Above);
        registry.set("BTC/USDT", 110.0, AlertDirection::Above);
        assert_eq!(registry.len(), 2);

        // Only the lower target fires
        let fired = registry.check("BTC/USDT", 105.0, 0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].target_price, 100.0);
        assert_eq!(registry.active("BTC/USDT").len(), 1);
    }

    #[test]
    fn test_remove_by_id() {
        let mut registry = AlertRegistry::new();
        let id = registry.set("BTC/USDT", 100.0, AlertDirection::Above);
        registry.set("ETH/USDT", 50.0, AlertDirection::Below);

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert_eq!(registry.len(), 1);
        assert!(registry.check("BTC/USDT", 200.0, 0).is_empty());
    }

    #[test]
    fn test_unknown_symbol_check_is_noop() {
        let mut registry = AlertRegistry::new();
        assert!(registry.check("DOGE/USDT", 1.0, 0).is_empty());
    }

    #[test]
    fn test_remove_symbol_teardown() {
        let mut registry = AlertRegistry::new();
        registry.set("BTC/USDT", 100.0, AlertDirection::Above);
        registry.set("BTC/USDT", 90.0, AlertDirection::Below);
        registry.set("ETH/USDT", 50.0, AlertDirection::Below);

        registry.remove_symbol("BTC/USDT");
        assert_eq!(registry.len(), 1);
        assert!(!registry.active("ETH/USDT").is_empty());
    }
}
