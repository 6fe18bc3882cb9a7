//! End-to-end pipeline tests: ticks through the aggregator and indicator
//! engine into routed orders, plus the backfill warm-up protocol.

use swingbot::application::market_data::candle_aggregator::CandleAggregator;
use swingbot::application::market_data::indicator_engine::{IndicatorConfig, IndicatorEngine};
use swingbot::application::orchestrator::{
    LiveRouter, OrderRouter, SimulatedRouter, TradingOrchestrator,
};
use swingbot::domain::market::timeframe::Timeframe;
use swingbot::domain::market::types::{Candle, MarketEvent, OrderSide};
use swingbot::domain::trading::ledger::Ledger;
use swingbot::infrastructure::mock::{MockExecutionSink, ScriptedHistory};

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const HOUR_MS: i64 = 3_600_000;
const BASE: i64 = 1_704_067_200_000;

/// Small periods so warm-up completes within a handful of hourly candles.
fn small_config() -> IndicatorConfig {
    IndicatorConfig {
        short_ma_period: 2,
        long_ma_period: 3,
        rsi_period: 5,
        macd_fast_period: 2,
        macd_slow_period: 3,
        macd_signal_period: 2,
        bollinger_period: 3,
        bollinger_std_dev: 2.0,
    }
}

fn orchestrator(config: IndicatorConfig, router: Arc<dyn OrderRouter>) -> TradingOrchestrator {
    TradingOrchestrator::new(
        CandleAggregator::new(Timeframe::OneHour),
        IndicatorEngine::new(config),
        router,
        dec!(100),
        Duration::from_secs(300),
        5,
    )
}

fn tick(close: f64, volume: f64, hour: i64) -> MarketEvent {
    MarketEvent::Tick {
        symbol: "TSLA".to_string(),
        close: Decimal::from_f64(close).unwrap(),
        volume: Decimal::from_f64(volume).unwrap(),
        timestamp: BASE + hour * HOUR_MS,
    }
}

fn bar(close: f64, hour: i64) -> Candle {
    Candle {
        symbol: "TSLA".to_string(),
        close: Decimal::from_f64(close).unwrap(),
        volume: dec!(1000),
        timestamp: BASE + hour * HOUR_MS,
    }
}

/// A declining run ending in a sharp volume-backed reversal. At the eighth
/// closed candle every buy factor lines up at once: the 2-period MA crosses
/// above the 3-period MA, RSI sits at 50, the MACD line crosses its signal,
/// the Bollinger bands are squeezed, and volume tops the preceding five.
fn buy_setup_ticks() -> Vec<MarketEvent> {
    let closes = [100.0, 99.0, 98.0, 97.0, 96.0, 95.0, 93.0, 98.0];
    let mut ticks: Vec<MarketEvent> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| tick(close, 10.0 + i as f64, i as i64))
        .collect();
    // One more tick in the next bucket closes the eighth candle.
    ticks.push(tick(97.0, 5.0, closes.len() as i64));
    ticks
}

#[tokio::test]
async fn test_buy_setup_fills_simulated_ledger() {
    let ledger = Arc::new(RwLock::new(Ledger::new(dec!(100000))));
    let mut orch = orchestrator(small_config(), Arc::new(SimulatedRouter::new(ledger.clone())));

    for event in buy_setup_ticks() {
        orch.handle_event(event).await;
    }

    let ledger = ledger.read().await;
    let position = ledger.position("TSLA");
    assert_eq!(position.quantity, dec!(100));
    assert_eq!(position.entry_price, dec!(98));
    // 100 shares at the triggering candle's close of 98.
    assert_eq!(ledger.cash(), dec!(90200));
}

#[tokio::test]
async fn test_buy_setup_reaches_live_sink() {
    let sink = Arc::new(MockExecutionSink::new());
    let mut orch = orchestrator(small_config(), Arc::new(LiveRouter::new(sink.clone())));

    for event in buy_setup_ticks() {
        orch.handle_event(event).await;
    }

    let orders = sink.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[0].symbol, "TSLA");
    assert_eq!(orders[0].quantity, dec!(100));
}

#[tokio::test]
async fn test_flat_market_routes_nothing() {
    let ledger = Arc::new(RwLock::new(Ledger::new(dec!(100000))));
    let mut orch = orchestrator(small_config(), Arc::new(SimulatedRouter::new(ledger.clone())));

    for hour in 0..20 {
        orch.handle_event(tick(250.0, 1000.0, hour)).await;
    }

    assert_eq!(orch.candle_count("TSLA", Timeframe::OneHour), 19);
    assert_eq!(ledger.read().await.cash(), dec!(100000));
    assert!(!ledger.read().await.has_position("TSLA"));
}

#[tokio::test]
async fn test_warmup_stops_after_sufficient_first_batch() {
    let ledger = Arc::new(RwLock::new(Ledger::new(dec!(100000))));
    let mut orch = orchestrator(small_config(), Arc::new(SimulatedRouter::new(ledger)));

    // 10 hourly bars close 9 candles, past the warm-up threshold of 5.
    let history = ScriptedHistory::new();
    history
        .script("TSLA", (0..10).map(|h| bar(250.0, h)).collect())
        .await;

    let symbols = vec!["TSLA".to_string()];
    orch.warmup(&history, &symbols).await;

    assert_eq!(history.calls("TSLA").await, 1);
    assert_eq!(orch.candle_count("TSLA", Timeframe::OneHour), 9);
}

#[tokio::test]
async fn test_warmup_requests_supplemental_batch_and_restarts() {
    let ledger = Arc::new(RwLock::new(Ledger::new(dec!(100000))));
    let mut orch = orchestrator(small_config(), Arc::new(SimulatedRouter::new(ledger)));

    // First batch closes only 3 candles; the longer retry closes 11. The
    // retry replaces the first replay outright, so the count must be 11,
    // not 3 + 11.
    let history = ScriptedHistory::new();
    history
        .script("TSLA", (0..4).map(|h| bar(250.0, h)).collect())
        .await;
    history
        .script("TSLA", (0..12).map(|h| bar(250.0, h)).collect())
        .await;

    let symbols = vec!["TSLA".to_string()];
    orch.warmup(&history, &symbols).await;

    assert_eq!(history.calls("TSLA").await, 2);
    assert_eq!(orch.candle_count("TSLA", Timeframe::OneHour), 11);
}

#[tokio::test]
async fn test_warmup_tolerates_empty_history() {
    let ledger = Arc::new(RwLock::new(Ledger::new(dec!(100000))));
    let mut orch = orchestrator(small_config(), Arc::new(SimulatedRouter::new(ledger)));

    let history = ScriptedHistory::new();
    let symbols = vec!["TSLA".to_string()];
    orch.warmup(&history, &symbols).await;

    // Nothing scripted: both the initial and supplemental calls come back
    // empty and the engine simply starts cold.
    assert_eq!(history.calls("TSLA").await, 2);
    assert_eq!(orch.candle_count("TSLA", Timeframe::OneHour), 0);
}

#[tokio::test]
async fn test_warmup_then_live_ticks_continue_seamlessly() {
    let ledger = Arc::new(RwLock::new(Ledger::new(dec!(100000))));
    let mut orch = orchestrator(small_config(), Arc::new(SimulatedRouter::new(ledger.clone())));

    // Backfill covers the declining run; live ticks deliver the reversal.
    let closes = [100.0, 99.0, 98.0, 97.0, 96.0, 95.0, 93.0];
    let history = ScriptedHistory::new();
    let bars: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            symbol: "TSLA".to_string(),
            close: Decimal::from_f64(close).unwrap(),
            volume: Decimal::from_f64(10.0 + i as f64).unwrap(),
            timestamp: BASE + i as i64 * HOUR_MS,
        })
        .collect();
    history.script("TSLA", bars).await;

    let symbols = vec!["TSLA".to_string()];
    orch.warmup(&history, &symbols).await;

    orch.handle_event(tick(98.0, 17.0, 7)).await;
    orch.handle_event(tick(97.0, 5.0, 8)).await;

    let ledger = ledger.read().await;
    assert_eq!(ledger.position("TSLA").quantity, dec!(100));
    assert_eq!(ledger.cash(), dec!(90200));
}
