//! Signal aggregation - Combines indicator votes into one directional verdict
//!
//! Pure function over an IndicatorSet and the close sequence. Inspects the
//! last RSI value, the last two MACD histogram values and the last close
//! against the last Bollinger bands; each contributes a BUY/SELL vote with
//! a human-readable reason. Indicators without enough history cast no vote.

use crate::config::SignalConfig;
use crate::indicators::IndicatorSet;
use crate::types::{Signal, SignalComponent, SignalDirection, Vote};

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

/// Derive a directional signal from one indicator snapshot.
///
/// `strength = |bullish / (bullish + bearish) - 0.5| * 2`, clamped to
/// [0, 1]. Overall verdict: BULLISH above the bullish ratio threshold,
/// BEARISH below the bearish one, otherwise NEUTRAL. Zero votes means
/// NEUTRAL with zero strength.
pub fn aggregate(set: &IndicatorSet, closes: &[f64], config: &SignalConfig) -> Signal {
    let mut components = Vec::with_capacity(3);

    if let Some(&rsi) = set.rsi.last() {
        let (direction, reason) = if rsi < RSI_OVERSOLD {
            (Vote::Buy, format!("RSI {:.1} oversold", rsi))
        } else if rsi > RSI_OVERBOUGHT {
            (Vote::Sell, format!("RSI {:.1} overbought", rsi))
        } else {
            (Vote::Hold, format!("RSI {:.1} in neutral range", rsi))
        };
        components.push(SignalComponent {
            indicator: "RSI".to_string(),
            direction,
            reason,
        });
    }

    if set.macd.histogram.len() >= 2 {
        let prev = set.macd.histogram[set.macd.histogram.len() - 2];
        let curr = set.macd.histogram[set.macd.histogram.len() - 1];
        let (direction, reason) = if prev <= 0.0 && curr > 0.0 {
            (Vote::Buy, "MACD histogram bullish cross".to_string())
        } else if prev >= 0.0 && curr < 0.0 {
            (Vote::Sell, "MACD histogram bearish cross".to_string())
        } else {
            (Vote::Hold, "MACD histogram no cross".to_string())
        };
        components.push(SignalComponent {
            indicator: "MACD".to_string(),
            direction,
            reason,
        });
    }

    if let (Some(&close), Some(&upper), Some(&lower)) = (
        closes.last(),
        set.bollinger.upper.last(),
        set.bollinger.lower.last(),
    ) {
        let (direction, reason) = if close <= lower {
            (
                Vote::Buy,
                format!("close {:.2} at or below lower band {:.2}", close, lower),
            )
        } else if close >= upper {
            (
                Vote::Sell,
                format!("close {:.2} at or above upper band {:.2}", close, upper),
            )
        } else {
            (Vote::Hold, "close inside bands".to_string())
        };
        components.push(SignalComponent {
            indicator: "Bollinger".to_string(),
            direction,
            reason,
        });
    }

    let bullish = components
        .iter()
        .filter(|c| c.direction == Vote::Buy)
        .count();
    let bearish = components
        .iter()
        .filter(|c| c.direction == Vote::Sell)
        .count();

    let (overall, strength) = if bullish + bearish == 0 {
        (SignalDirection::Neutral, 0.0)
    } else {
        let ratio = bullish as f64 / (bullish + bearish) as f64;
        let strength = ((ratio - 0.5).abs() * 2.0).clamp(0.0, 1.0);
        let overall = if ratio > config.bullish_threshold {
            SignalDirection::Bullish
        } else if ratio < config.bearish_threshold {
            SignalDirection::Bearish
        } else {
            SignalDirection::Neutral
        };
        (overall, strength)
    };

    Signal {
        overall,
        strength,
        components,
    }
}
