use crate::domain::market::types::Signal;
use tracing::debug;

/// Bounded indicator histories for one (symbol, timeframe), copied out of
/// the engine for a single evaluation. Empty/`None` fields mean the
/// corresponding warm-up is unmet.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSnapshot {
    /// Short moving average, oldest first, at most 2 samples.
    pub short_ma: Vec<f64>,
    /// Long moving average, oldest first, at most 2 samples.
    pub long_ma: Vec<f64>,
    pub rsi: Option<f64>,
    /// (macd line, signal line) pairs, oldest first, at most 5 samples.
    pub macd_pairs: Vec<(f64, f64)>,
    /// (upper, middle, lower) of the latest Bollinger bands.
    pub bollinger: Option<(f64, f64, f64)>,
    /// Candle volumes, oldest first, at most 6 samples.
    pub volumes: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CrossDirection {
    Above,
    Below,
}

/// Scans the most recent 1-3 transitions of the MACD pair history for a
/// crossover of the macd line over (or under) the signal line.
fn has_macd_crossover(pairs: &[(f64, f64)], direction: CrossDirection) -> bool {
    if pairs.len() < 2 {
        return false;
    }
    let last = pairs.len() - 1;
    for i in 1..pairs.len().min(4) {
        let (prev_macd, prev_signal) = pairs[last - i];
        let (curr_macd, curr_signal) = pairs[last - i + 1];
        let crossed = match direction {
            CrossDirection::Above => prev_macd <= prev_signal && curr_macd > curr_signal,
            CrossDirection::Below => prev_macd >= prev_signal && curr_macd < curr_signal,
        };
        if crossed {
            return true;
        }
    }
    false
}

/// Multi-factor swing evaluator: pure function from an indicator snapshot to
/// Buy/Sell/Hold. All state lives in the snapshot.
///
/// Buy requires every factor at once: MA cross-up, RSI below the overbought
/// line, a recent bullish MACD crossover, a Bollinger squeeze, and volume
/// strictly above each of the preceding five samples. Sell mirrors the
/// directional factors without the volume condition.
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    rsi_overbought: f64,
    squeeze_ratio: f64,
}

impl Default for SignalEvaluator {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            squeeze_ratio: 0.10,
        }
    }
}

impl SignalEvaluator {
    pub fn evaluate(&self, snapshot: &IndicatorSnapshot) -> Signal {
        // Crossover detection needs two samples of each average; anything
        // less is an immediate Hold regardless of the other factors.
        if snapshot.short_ma.len() < 2 || snapshot.long_ma.len() < 2 {
            return Signal::Hold;
        }
        let (short_prev, short_curr) = (snapshot.short_ma[0], snapshot.short_ma[1]);
        let (long_prev, long_curr) = (snapshot.long_ma[0], snapshot.long_ma[1]);
        let ma_cross_up = short_prev <= long_prev && short_curr > long_curr;
        let ma_cross_down = short_prev >= long_prev && short_curr < long_curr;

        let rsi_buy = snapshot.rsi.is_some_and(|r| r < self.rsi_overbought);
        let rsi_sell = snapshot.rsi.is_some_and(|r| r > self.rsi_overbought);

        let macd_buy = has_macd_crossover(&snapshot.macd_pairs, CrossDirection::Above);
        let macd_sell = has_macd_crossover(&snapshot.macd_pairs, CrossDirection::Below);

        let squeeze = snapshot
            .bollinger
            .is_some_and(|(upper, middle, lower)| (upper - lower) / middle < self.squeeze_ratio);

        let volume_surge = snapshot.volumes.len() >= 6 && {
            let current = snapshot.volumes[snapshot.volumes.len() - 1];
            snapshot.volumes[snapshot.volumes.len() - 6..snapshot.volumes.len() - 1]
                .iter()
                .all(|&v| current > v)
        };

        debug!(
            "SignalEvaluator: cross_up={} cross_down={} rsi_buy={} macd_buy={} macd_sell={} squeeze={} volume_surge={}",
            ma_cross_up, ma_cross_down, rsi_buy, macd_buy, macd_sell, squeeze, volume_surge
        );

        if ma_cross_up && rsi_buy && macd_buy && squeeze && volume_surge {
            Signal::Buy
        } else if ma_cross_down && rsi_sell && macd_sell && squeeze {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}
