//! Indicator library - Technical indicators over candle history
//!
//! Pure functions over price sequences:
//! - SMA / EMA
//! - RSI (Wilder's smoothing)
//! - MACD (with proper EMA signal line)
//! - Bollinger Bands
//! - Stochastic %K/%D
//! - ATR (SMA of true ranges)
//! - Williams %R
//! - CCI
//! - Local support/resistance levels
//!
//! Every function is deterministic and side-effect-free. Outputs are
//! aligned to the end of the input; an input shorter than the minimum
//! window yields an empty sequence, which downstream consumers treat as
//! "no vote" rather than an error.

use serde::{Deserialize, Serialize};

use crate::config::IndicatorConfig;
use crate::series::CandleSeries;

/// Simple moving average over a trailing window.
///
/// Output length is `n - period + 1`; empty if the input is shorter than
/// the period.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(values.len() - period + 1);
    let mut window_sum: f64 = values[..period].iter().sum();
    result.push(window_sum / period as f64);

    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        result.push(window_sum / period as f64);
    }

    result
}

/// Exponential moving average, seeded with the first data point.
///
/// Multiplier `k = 2 / (period + 1)`. The output covers the full input
/// (length `n`) because the seed is the first value, not a warm-up SMA.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.is_empty() {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    result.push(values[0]);

    for &value in &values[1..] {
        let prev = *result.last().unwrap();
        result.push(value * k + prev * (1.0 - k));
    }

    result
}

/// Relative Strength Index with Wilder's smoothing.
///
/// Seed average gain/loss from the first `period` deltas, then smooth with
/// weight `(period - 1) / period`. `avg_loss == 0` is special-cased to
/// RSI = 100 so the undefined ratio never propagates NaN. Output length is
/// `n - period`; empty if fewer than `period + 1` values.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = deltas[..period]
        .iter()
        .map(|d| d.max(0.0))
        .sum::<f64>()
        / period as f64;
    let mut avg_loss = deltas[..period]
        .iter()
        .map(|d| (-d).max(0.0))
        .sum::<f64>()
        / period as f64;

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    result.push(rsi_value(avg_gain, avg_loss));

    for delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        result.push(rsi_value(avg_gain, avg_loss));
    }

    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// MACD output: line, signal line and histogram, equally long
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacdOutput {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD: `EMA(fast) - EMA(slow)`, signal = EMA of the line, histogram =
/// line - signal.
///
/// If the fast and slow EMA series ever differ in length the shorter is
/// left-padded with its first value so both cover the same index range.
/// Empty if the input is shorter than the slow period.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdOutput {
    if values.len() < slow || fast == 0 || slow == 0 || signal == 0 {
        return MacdOutput::default();
    }

    let mut ema_fast = ema(values, fast);
    let mut ema_slow = ema(values, slow);
    align_left_padded(&mut ema_fast, &mut ema_slow);

    let line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    let mut signal_line = ema(&line, signal);
    let mut line = line;
    align_left_padded(&mut line, &mut signal_line);

    let histogram: Vec<f64> = line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| m - s)
        .collect();

    MacdOutput {
        macd: line,
        signal: signal_line,
        histogram,
    }
}

/// Left-pad the shorter of two series with its own first value until both
/// cover the same index range.
fn align_left_padded(a: &mut Vec<f64>, b: &mut Vec<f64>) {
    let (shorter, longer_len) = if a.len() < b.len() {
        (a, b.len())
    } else {
        let len = a.len();
        (b, len)
    };
    if !shorter.is_empty() {
        let first = shorter[0];
        let pad = longer_len - shorter.len();
        shorter.splice(0..0, std::iter::repeat(first).take(pad));
    }
}

/// Bollinger Bands: middle SMA with bands at `k` population standard
/// deviations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(values: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    if period == 0 || values.len() < period {
        return BollingerBands::default();
    }

    let middle = sma(values, period);
    let mut upper = Vec::with_capacity(middle.len());
    let mut lower = Vec::with_capacity(middle.len());

    for (offset, mean) in middle.iter().enumerate() {
        let window = &values[offset..offset + period];
        let variance =
            window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        let half_width = std_dev * variance.sqrt();
        upper.push(mean + half_width);
        lower.push(mean - half_width);
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

/// Stochastic oscillator output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StochasticOutput {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

/// Stochastic %K/%D.
///
/// `%K = (close - LL) / (HH - LL) * 100` over the trailing `k_period`
/// window; `%D = SMA(%K, d_period)`. A flat window (`HH == LL`) yields
/// %K = 50 instead of a division by zero.
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> StochasticOutput {
    let n = closes.len().min(highs.len()).min(lows.len());
    if k_period == 0 || d_period == 0 || n < k_period {
        return StochasticOutput::default();
    }

    let mut k = Vec::with_capacity(n - k_period + 1);
    for i in (k_period - 1)..n {
        let window_start = i + 1 - k_period;
        let highest = highs[window_start..=i]
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        let lowest = lows[window_start..=i]
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);

        if highest == lowest {
            k.push(50.0);
        } else {
            k.push((closes[i] - lowest) / (highest - lowest) * 100.0);
        }
    }

    let d = sma(&k, d_period);
    StochasticOutput { k, d }
}

/// Average True Range as an SMA of true ranges.
///
/// True range is `max(high - low, |high - prev_close|, |low - prev_close|)`.
/// This is deliberately the plain-SMA variant, not Wilder smoothing;
/// downstream sizing depends on this magnitude.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len().min(highs.len()).min(lows.len());
    if period == 0 || n < 2 {
        return Vec::new();
    }

    let mut true_ranges = Vec::with_capacity(n - 1);
    for i in 1..n {
        let prev_close = closes[i - 1];
        let tr = (highs[i] - lows[i])
            .max((highs[i] - prev_close).abs())
            .max((lows[i] - prev_close).abs());
        true_ranges.push(tr);
    }

    sma(&true_ranges, period)
}

/// Williams %R: `(HH - close) / (HH - LL) * -100`.
///
/// A flat window is guarded to -50 (midpoint) so NaN never reaches an
/// emitted event.
pub fn williams_r(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len().min(highs.len()).min(lows.len());
    if period == 0 || n < period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(n - period + 1);
    for i in (period - 1)..n {
        let window_start = i + 1 - period;
        let highest = highs[window_start..=i]
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        let lowest = lows[window_start..=i]
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);

        if highest == lowest {
            result.push(-50.0);
        } else {
            result.push((highest - closes[i]) / (highest - lowest) * -100.0);
        }
    }

    result
}

/// Commodity Channel Index over typical prices `(H + L + C) / 3`.
///
/// `CCI = (tp - SMA(tp)) / (0.015 * MAD(tp))`; a zero mean absolute
/// deviation yields 0.
pub fn cci(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len().min(highs.len()).min(lows.len());
    if period == 0 || n < period {
        return Vec::new();
    }

    let typical: Vec<f64> = (0..n)
        .map(|i| (highs[i] + lows[i] + closes[i]) / 3.0)
        .collect();
    let means = sma(&typical, period);

    let mut result = Vec::with_capacity(means.len());
    for (offset, mean) in means.iter().enumerate() {
        let window = &typical[offset..offset + period];
        let mad = window.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;
        let tp = typical[offset + period - 1];

        if mad == 0.0 {
            result.push(0.0);
        } else {
            result.push((tp - mean) / (0.015 * mad));
        }
    }

    result
}

/// A detected support or resistance level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price of the local extremum
    pub price: f64,
    /// Index into the input sequence
    pub index: usize,
    /// Level strength (1 for a single-scan extremum)
    pub strength: u32,
}

/// Local support and resistance levels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support: Vec<PriceLevel>,
    pub resistance: Vec<PriceLevel>,
}

/// Local-extremum scan for support/resistance.
///
/// A point is resistance if it is >= every value in
/// `[i - lookback, i + lookback]`, support if <= every value in that
/// window. O(n * lookback), fine for bounded history windows.
pub fn support_resistance(values: &[f64], lookback: usize) -> SupportResistance {
    let mut levels = SupportResistance::default();
    if lookback == 0 || values.len() < 2 * lookback + 1 {
        return levels;
    }

    for i in lookback..(values.len() - lookback) {
        let window = &values[i - lookback..=i + lookback];
        let value = values[i];

        if window.iter().all(|&v| value >= v) {
            levels.resistance.push(PriceLevel {
                price: value,
                index: i,
                strength: 1,
            });
        } else if window.iter().all(|&v| value <= v) {
            levels.support.push(PriceLevel {
                price: value,
                index: i,
                strength: 1,
            });
        }
    }

    levels
}

/// Snapshot of every indicator computed from one series state.
///
/// A value type: never mutated after creation, regenerated on each
/// indicator tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: Vec<f64>,
    pub macd: MacdOutput,
    pub bollinger: BollingerBands,
    pub stochastic: StochasticOutput,
    pub atr: Vec<f64>,
    pub williams_r: Vec<f64>,
    pub cci: Vec<f64>,
    pub levels: SupportResistance,
}

impl IndicatorSet {
    /// Compute the full battery from a series snapshot
    pub fn compute(series: &CandleSeries, config: &IndicatorConfig) -> Self {
        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();

        Self {
            rsi: rsi(&closes, config.rsi_period),
            macd: macd(
                &closes,
                config.macd_fast,
                config.macd_slow,
                config.macd_signal,
            ),
            bollinger: bollinger(&closes, config.bb_period, config.bb_std_dev),
            stochastic: stochastic(
                &highs,
                &lows,
                &closes,
                config.stoch_k_period,
                config.stoch_d_period,
            ),
            atr: atr(&highs, &lows, &closes, config.atr_period),
            williams_r: williams_r(&highs, &lows, &closes, config.williams_period),
            cci: cci(&highs, &lows, &closes, config.cci_period),
            levels: support_resistance(&closes, config.sr_lookback),
        }
    }
}
