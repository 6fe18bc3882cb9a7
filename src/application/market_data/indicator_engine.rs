use crate::application::signal::IndicatorSnapshot;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::types::Candle;
use rust_decimal::prelude::ToPrimitive;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Indicator periods. Defaults match the swing strategy this engine was
/// built for: 20/50 MA crossover, RSI-14, MACD(12,26,9), Bollinger(20, 2).
#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    pub rsi_period: usize,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            short_ma_period: 20,
            long_ma_period: 50,
            rsi_period: 14,
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
        }
    }
}

impl IndicatorConfig {
    /// Candles required before the MACD signal line may exist: the slow EMA
    /// must be seeded and a full signal-period of historical macd-line values
    /// must have accumulated on top of it.
    pub fn macd_warmup_candles(&self) -> usize {
        self.macd_slow_period + self.macd_signal_period
    }
}

/// Named indicator lookups for `IndicatorEngine::get`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Indicator {
    Sma(usize),
    Ema(usize),
    Rsi,
    MacdLine,
    MacdSignal,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
}

/// Recursive EMA accumulator, seeded once as the mean of the first `period`
/// closes, then `ema += (close - ema) * 2 / (period + 1)`.
///
/// This state persists for the life of the symbol and is NOT recomputable
/// from the bounded close window; losing it silently corrupts every
/// downstream MACD value.
#[derive(Debug, Clone)]
struct EmaState {
    period: usize,
    seed_sum: f64,
    seed_count: usize,
    value: Option<f64>,
}

impl EmaState {
    fn new(period: usize) -> Self {
        Self {
            period,
            seed_sum: 0.0,
            seed_count: 0,
            value: None,
        }
    }

    fn update(&mut self, close: f64) -> Option<f64> {
        match self.value {
            None => {
                self.seed_sum += close;
                self.seed_count += 1;
                if self.seed_count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
            Some(prev) => {
                let alpha = 2.0 / (self.period as f64 + 1.0);
                self.value = Some(prev + (close - prev) * alpha);
            }
        }
        self.value
    }
}

/// MACD signal-line accumulator. Collects genuinely historical macd-line
/// values while unseeded; once the candle count reaches the warm-up
/// requirement, seeds from the mean of the last `period` collected values
/// and switches to the recursive update with alpha = 2 / (period + 1).
#[derive(Debug, Clone)]
struct MacdSignalState {
    period: usize,
    warmup: Vec<f64>,
    value: Option<f64>,
}

impl MacdSignalState {
    fn new(period: usize) -> Self {
        Self {
            period,
            warmup: Vec::new(),
            value: None,
        }
    }

    fn update(&mut self, macd_line: f64, candles_seen: usize, required: usize) -> Option<f64> {
        match self.value {
            Some(prev) => {
                let alpha = 2.0 / (self.period as f64 + 1.0);
                self.value = Some(prev + (macd_line - prev) * alpha);
            }
            None => {
                self.warmup.push(macd_line);
                if candles_seen >= required && self.warmup.len() >= self.period {
                    let window = &self.warmup[self.warmup.len() - self.period..];
                    self.value = Some(window.iter().sum::<f64>() / self.period as f64);
                    self.warmup.clear();
                }
            }
        }
        self.value
    }
}

// Bounded history retention: the close window matches the original engine;
// the per-indicator histories keep exactly what crossover/trend detection
// needs and nothing more.
const CLOSE_HISTORY: usize = 100;
const MA_HISTORY: usize = 2;
const RSI_HISTORY: usize = 1;
const MACD_HISTORY: usize = 5;
const BOLLINGER_HISTORY: usize = 1;
const VOLUME_HISTORY: usize = 6;

/// Per-(symbol, timeframe) indicator state record, created lazily on the
/// first closed candle.
#[derive(Debug)]
struct IndicatorState {
    candles_seen: usize,
    closes: VecDeque<f64>,
    volumes: VecDeque<f64>,
    short_ma: VecDeque<f64>,
    long_ma: VecDeque<f64>,
    rsi: VecDeque<f64>,
    macd_pairs: VecDeque<(f64, f64)>,
    bollinger: VecDeque<(f64, f64, f64)>,
    emas: HashMap<usize, EmaState>,
    macd_line: Option<f64>,
    macd_signal: MacdSignalState,
}

impl IndicatorState {
    fn new(config: &IndicatorConfig) -> Self {
        let mut emas = HashMap::new();
        emas.insert(
            config.macd_fast_period,
            EmaState::new(config.macd_fast_period),
        );
        emas.insert(
            config.macd_slow_period,
            EmaState::new(config.macd_slow_period),
        );
        Self {
            candles_seen: 0,
            closes: VecDeque::with_capacity(CLOSE_HISTORY),
            volumes: VecDeque::with_capacity(VOLUME_HISTORY),
            short_ma: VecDeque::with_capacity(MA_HISTORY),
            long_ma: VecDeque::with_capacity(MA_HISTORY),
            rsi: VecDeque::with_capacity(RSI_HISTORY),
            macd_pairs: VecDeque::with_capacity(MACD_HISTORY),
            bollinger: VecDeque::with_capacity(BOLLINGER_HISTORY),
            emas,
            macd_line: None,
            macd_signal: MacdSignalState::new(config.macd_signal_period),
        }
    }

    fn update(&mut self, symbol: &str, close: f64, volume: f64, config: &IndicatorConfig) {
        self.candles_seen += 1;
        push_bounded(&mut self.closes, CLOSE_HISTORY, close);
        push_bounded(&mut self.volumes, VOLUME_HISTORY, volume);

        if let Some(v) = sma(&self.closes, config.short_ma_period) {
            push_bounded(&mut self.short_ma, MA_HISTORY, v);
        }
        if let Some(v) = sma(&self.closes, config.long_ma_period) {
            push_bounded(&mut self.long_ma, MA_HISTORY, v);
        }
        if let Some(v) = windowed_rsi(&self.closes, config.rsi_period) {
            push_bounded(&mut self.rsi, RSI_HISTORY, v);
        }

        let mut fast = None;
        let mut slow = None;
        for (period, ema) in self.emas.iter_mut() {
            let value = ema.update(close);
            if *period == config.macd_fast_period {
                fast = value;
            }
            if *period == config.macd_slow_period {
                slow = value;
            }
        }
        if let (Some(fast), Some(slow)) = (fast, slow) {
            let line = fast - slow;
            self.macd_line = Some(line);
            let was_seeded = self.macd_signal.value.is_some();
            if let Some(signal) =
                self.macd_signal
                    .update(line, self.candles_seen, config.macd_warmup_candles())
            {
                if !was_seeded {
                    info!(
                        "IndicatorEngine: {} MACD signal line seeded at {:.4} after {} candles",
                        symbol, signal, self.candles_seen
                    );
                }
                push_bounded(&mut self.macd_pairs, MACD_HISTORY, (line, signal));
            }
        }

        if let Some(middle) = sma(&self.closes, config.bollinger_period) {
            let band = config.bollinger_std_dev
                * population_std_dev(&self.closes, config.bollinger_period, middle);
            push_bounded(
                &mut self.bollinger,
                BOLLINGER_HISTORY,
                (middle + band, middle, middle - band),
            );
        }
    }
}

fn push_bounded<T>(deque: &mut VecDeque<T>, cap: usize, value: T) {
    if deque.len() == cap {
        deque.pop_front();
    }
    deque.push_back(value);
}

/// Mean of the last `period` values; `None` below `period` samples.
fn sma(closes: &VecDeque<f64>, period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let sum: f64 = closes.iter().skip(closes.len() - period).sum();
    Some(sum / period as f64)
}

/// Plain windowed RSI over the last `period + 1` closes. 100 with zero
/// losses in the window, 0 with zero gains.
fn windowed_rsi(closes: &VecDeque<f64>, period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let window: Vec<f64> = closes
        .iter()
        .skip(closes.len() - (period + 1))
        .copied()
        .collect();
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let diff = pair[1] - pair[0];
        if diff > 0.0 {
            gains += diff;
        } else {
            losses -= diff;
        }
    }
    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    if avg_gain == 0.0 {
        return Some(0.0);
    }
    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}

/// Population standard deviation of the last `period` closes around `mean`.
fn population_std_dev(closes: &VecDeque<f64>, period: usize, mean: f64) -> f64 {
    let variance: f64 = closes
        .iter()
        .skip(closes.len() - period)
        .map(|c| (c - mean) * (c - mean))
        .sum::<f64>()
        / period as f64;
    variance.sqrt()
}

/// Consumes closed candles and maintains per-(symbol, timeframe) indicator
/// state: a bounded close window, bounded crossover-detection histories, and
/// the recursive EMA/MACD-signal accumulators that persist across candles.
pub struct IndicatorEngine {
    config: IndicatorConfig,
    states: HashMap<(String, Timeframe), IndicatorState>,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn on_closed_candle(&mut self, timeframe: Timeframe, candle: &Candle) {
        let Some(close) = candle.close.to_f64() else {
            warn!(
                "IndicatorEngine: unrepresentable close {} for {}, candle skipped",
                candle.close, candle.symbol
            );
            return;
        };
        let volume = candle.volume.to_f64().unwrap_or(0.0);

        let state = self
            .states
            .entry((candle.symbol.clone(), timeframe))
            .or_insert_with(|| IndicatorState::new(&self.config));
        state.update(&candle.symbol, close, volume, &self.config);
        debug!(
            "IndicatorEngine: {} {} candle #{} C:{:.4}",
            candle.symbol, timeframe, state.candles_seen, close
        );
    }

    /// Current value of one indicator, `None` while its warm-up is unmet.
    pub fn get(&self, symbol: &str, timeframe: Timeframe, indicator: Indicator) -> Option<f64> {
        let state = self.states.get(&(symbol.to_string(), timeframe))?;
        match indicator {
            Indicator::Sma(period) => sma(&state.closes, period),
            Indicator::Ema(period) => state.emas.get(&period).and_then(|e| e.value),
            Indicator::Rsi => windowed_rsi(&state.closes, self.config.rsi_period),
            Indicator::MacdLine => state.macd_line,
            Indicator::MacdSignal => state.macd_signal.value,
            Indicator::BollingerUpper => state.bollinger.back().map(|b| b.0),
            Indicator::BollingerMiddle => state.bollinger.back().map(|b| b.1),
            Indicator::BollingerLower => state.bollinger.back().map(|b| b.2),
        }
    }

    /// Copy of the bounded histories the signal evaluator consumes.
    pub fn snapshot(&self, symbol: &str, timeframe: Timeframe) -> IndicatorSnapshot {
        match self.states.get(&(symbol.to_string(), timeframe)) {
            None => IndicatorSnapshot::default(),
            Some(state) => IndicatorSnapshot {
                short_ma: state.short_ma.iter().copied().collect(),
                long_ma: state.long_ma.iter().copied().collect(),
                rsi: state.rsi.back().copied(),
                macd_pairs: state.macd_pairs.iter().copied().collect(),
                bollinger: state.bollinger.back().copied(),
                volumes: state.volumes.iter().copied().collect(),
            },
        }
    }

    /// Closed candles observed for (symbol, timeframe). Used to decide
    /// whether backfill produced enough history for MACD warm-up.
    pub fn candle_count(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.states
            .get(&(symbol.to_string(), timeframe))
            .map(|s| s.candles_seen)
            .unwrap_or(0)
    }

    /// Drops all state for `symbol` across timeframes. Used when a backfill
    /// replay has to start over from a longer history.
    pub fn reset_symbol(&mut self, symbol: &str) {
        self.states.retain(|(s, _), _| s != symbol);
    }
}
