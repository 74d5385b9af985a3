//! Anomaly detection - Rolling z-score over recent closes
//!
//! Classifies sharp spikes and drops against a short rolling baseline.
//! Anomalies are ephemeral: computed and emitted per tick, never retained.

use crate::types::{Anomaly, AnomalyKind, AnomalySeverity};

/// Samples considered per detection (current close plus 19 baseline closes)
pub const ANOMALY_WINDOW: usize = 20;

/// Rolling z-score anomaly detector
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    threshold: f64,
}

impl AnomalyDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Check the latest close against its rolling baseline.
    ///
    /// Needs at least 20 closes; returns None during cold-start. The
    /// baseline mean is taken over the first 19 of the last 20 closes
    /// (the current close is excluded), while the population standard
    /// deviation spans the full 20-sample window around that mean so a
    /// jump off a flat baseline is measurable. A fully flat window
    /// (zero deviation) is suppressed rather than divided by.
    pub fn check(&self, symbol: &str, closes: &[f64], timestamp: i64) -> Option<Anomaly> {
        if closes.len() < ANOMALY_WINDOW {
            tracing::debug!(
                symbol = %symbol,
                samples = closes.len(),
                required = ANOMALY_WINDOW,
                "Anomaly check skipped: insufficient history"
            );
            return None;
        }

        let window = &closes[closes.len() - ANOMALY_WINDOW..];
        let current = window[ANOMALY_WINDOW - 1];
        let baseline = &window[..ANOMALY_WINDOW - 1];

        let mean = baseline.iter().sum::<f64>() / baseline.len() as f64;
        let variance =
            window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / window.len() as f64;
        let std_dev = variance.sqrt();

        if std_dev == 0.0 {
            return None;
        }

        let z_score = (current - mean).abs() / std_dev;
        if z_score <= self.threshold {
            return None;
        }

        let kind = if current > mean {
            AnomalyKind::Spike
        } else {
            AnomalyKind::Drop
        };
        let severity = if z_score > 2.0 * self.threshold {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        };

        tracing::warn!(
            symbol = %symbol,
            kind = %kind,
            severity = %severity,
            z_score = z_score,
            current = current,
            baseline_mean = mean,
            "Price anomaly detected"
        );

        Some(Anomaly {
            symbol: symbol.to_string(),
            current_price: current,
            avg_price: mean,
            z_score,
            kind,
            severity,
            timestamp,
        })
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(5.0)
    }
}
