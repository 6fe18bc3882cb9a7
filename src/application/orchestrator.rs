use crate::application::market_data::candle_aggregator::CandleAggregator;
use crate::application::market_data::indicator_engine::{Indicator, IndicatorEngine};
use crate::application::signal::SignalEvaluator;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::types::{Candle, MarketEvent, OrderRequest, OrderSide, Signal};
use crate::domain::ports::{ExecutionSink, HistoricalData};
use crate::domain::trading::ledger::Ledger;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info, warn};

/// Extra days requested when the initial backfill leaves MACD warm-up unmet.
const SUPPLEMENT_BACKFILL_DAYS: u32 = 5;

/// Destination for actionable signals, selected at construction: the
/// in-memory ledger in simulated mode, an external execution sink in live
/// mode.
#[async_trait]
pub trait OrderRouter: Send + Sync {
    /// Routes one order. `price` is the close that triggered the signal;
    /// live sinks ignore it and fill at the venue.
    async fn route(&self, order: &OrderRequest, price: Decimal) -> Result<()>;

    /// Periodic observability hook. Must not mutate any trading state.
    async fn report_realized(&self);
}

/// Applies orders to the in-memory ledger. Mirrors the simulated-bot rules:
/// buy only when flat, sell only when holding, so ledger rejections are
/// genuine anomalies rather than routine noise.
pub struct SimulatedRouter {
    ledger: Arc<RwLock<Ledger>>,
}

impl SimulatedRouter {
    pub fn new(ledger: Arc<RwLock<Ledger>>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl OrderRouter for SimulatedRouter {
    async fn route(&self, order: &OrderRequest, price: Decimal) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        match order.side {
            OrderSide::Buy => {
                if ledger.has_position(&order.symbol) {
                    debug!(
                        "SimulatedRouter: already holding {}, buy skipped",
                        order.symbol
                    );
                    return Ok(());
                }
                ledger.buy(&order.symbol, order.quantity, price)?;
            }
            OrderSide::Sell => {
                if !ledger.has_position(&order.symbol) {
                    debug!("SimulatedRouter: no position in {}, sell skipped", order.symbol);
                    return Ok(());
                }
                ledger.sell(&order.symbol, order.quantity, price)?;
            }
        }
        Ok(())
    }

    async fn report_realized(&self) {
        let ledger = self.ledger.read().await;
        info!(
            "[Portfolio Report] realized P&L: {}, cash: {}",
            ledger.report_realized(),
            ledger.cash()
        );
    }
}

/// Forwards orders to an external execution sink and interprets only its
/// success/failure.
pub struct LiveRouter {
    sink: Arc<dyn ExecutionSink>,
}

impl LiveRouter {
    pub fn new(sink: Arc<dyn ExecutionSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl OrderRouter for LiveRouter {
    async fn route(&self, order: &OrderRequest, _price: Decimal) -> Result<()> {
        self.sink.execute(order).await?;
        info!(
            "LiveRouter: placed {} order for {} {}",
            order.side, order.quantity, order.symbol
        );
        Ok(())
    }

    async fn report_realized(&self) {
        debug!("LiveRouter: realized P&L is tracked by the broker");
    }
}

/// Drains the inbound event queue in arrival order and drives the pipeline:
/// tick -> aggregator -> closed candle -> indicator engine -> evaluator ->
/// order router. A wall-clock interval reads realized P&L for observability.
pub struct TradingOrchestrator {
    aggregator: CandleAggregator,
    engine: IndicatorEngine,
    evaluator: SignalEvaluator,
    router: Arc<dyn OrderRouter>,
    trade_quantity: Decimal,
    report_interval: Duration,
    backfill_days: u32,
}

impl TradingOrchestrator {
    pub fn new(
        aggregator: CandleAggregator,
        engine: IndicatorEngine,
        router: Arc<dyn OrderRouter>,
        trade_quantity: Decimal,
        report_interval: Duration,
        backfill_days: u32,
    ) -> Self {
        Self {
            aggregator,
            engine,
            evaluator: SignalEvaluator::default(),
            router,
            trade_quantity,
            report_interval,
            backfill_days,
        }
    }

    /// Replays historical minute bars through the same ingestion path as live
    /// ticks, so warm-up state matches live streaming exactly. If a symbol
    /// ends up below the MACD warm-up threshold, one supplemental batch is
    /// requested and the symbol is replayed from scratch over the longer
    /// history. Empty or failed batches are tolerated: the engine simply
    /// starts cold and holds until warm.
    pub async fn warmup(&mut self, history: &dyn HistoricalData, symbols: &[String]) {
        let required = self.engine.config().macd_warmup_candles();
        let timeframe = self.aggregator.timeframe();

        for symbol in symbols {
            match history.minute_bars(symbol, self.backfill_days).await {
                Ok(bars) => self.replay(symbol, &bars),
                Err(e) => {
                    warn!("Warmup: backfill failed for {}: {:#}", symbol, e);
                    continue;
                }
            }

            if self.engine.candle_count(symbol, timeframe) < required {
                let days = self.backfill_days + SUPPLEMENT_BACKFILL_DAYS;
                info!(
                    "Warmup: {} has {}/{} {} candles, requesting {} days",
                    symbol,
                    self.engine.candle_count(symbol, timeframe),
                    required,
                    timeframe,
                    days
                );
                match history.minute_bars(symbol, days).await {
                    Ok(bars) => {
                        // Start over instead of stacking the longer batch on
                        // top of already-ingested bars: the overlap would
                        // double-count volume and corrupt the EMA seeds.
                        self.aggregator.reset_symbol(symbol);
                        self.engine.reset_symbol(symbol);
                        self.replay(symbol, &bars);
                    }
                    Err(e) => warn!("Warmup: supplemental backfill failed for {}: {:#}", symbol, e),
                }
            }

            info!(
                "Warmup: {} ready with {} {} candles",
                symbol,
                self.engine.candle_count(symbol, timeframe),
                timeframe
            );
        }
    }

    fn replay(&mut self, symbol: &str, bars: &[Candle]) {
        let timeframe = self.aggregator.timeframe();
        for bar in bars {
            if let Some(candle) = self
                .aggregator
                .ingest(symbol, bar.close, bar.volume, bar.timestamp)
            {
                self.engine.on_closed_candle(timeframe, &candle);
            }
        }
    }

    /// Runs until the feed channel closes.
    pub async fn run(&mut self, mut events: Receiver<MarketEvent>) {
        info!(
            "TradingOrchestrator started ({} decisions, reporting every {:?})",
            self.aggregator.timeframe(),
            self.report_interval
        );
        let mut report = tokio::time::interval(self.report_interval);
        // The first interval tick fires immediately; swallow it so the
        // initial report is not logged before any event arrives.
        report.tick().await;

        loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        info!("TradingOrchestrator: feed closed, shutting down");
                        break;
                    }
                },
                _ = report.tick() => self.router.report_realized().await,
            }
        }
    }

    /// Processes a single inbound event. Public so deterministic tests can
    /// drive the pipeline without channel timing.
    pub async fn handle_event(&mut self, event: MarketEvent) {
        match event {
            MarketEvent::Tick {
                symbol,
                close,
                volume,
                timestamp,
            } => {
                if let Some(candle) = self.aggregator.ingest(&symbol, close, volume, timestamp) {
                    self.on_closed_candle(candle).await;
                }
            }
        }
    }

    async fn on_closed_candle(&mut self, candle: Candle) {
        let timeframe = self.aggregator.timeframe();
        self.engine.on_closed_candle(timeframe, &candle);

        let snapshot = self.engine.snapshot(&candle.symbol, timeframe);
        let signal = self.evaluator.evaluate(&snapshot);
        let Some(side) = signal.side() else {
            return;
        };

        info!("Signal: {} {} @ {}", signal, candle.symbol, candle.close);
        let order = OrderRequest {
            side,
            symbol: candle.symbol.clone(),
            quantity: self.trade_quantity,
        };
        if let Err(e) = self.router.route(&order, candle.close).await {
            error!("Order routing failed for {}: {:#}", candle.symbol, e);
        }
    }

    /// Read-through to the indicator engine, for observability and tests.
    pub fn indicator(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        indicator: Indicator,
    ) -> Option<f64> {
        self.engine.get(symbol, timeframe, indicator)
    }

    pub fn candle_count(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.engine.candle_count(symbol, timeframe)
    }
}
