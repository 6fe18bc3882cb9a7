use swingbot::application::market_data::candle_aggregator::CandleAggregator;
use swingbot::application::market_data::indicator_engine::IndicatorEngine;
use swingbot::application::orchestrator::{
    LiveRouter, OrderRouter, SimulatedRouter, TradingOrchestrator,
};
use swingbot::config::{Config, Mode};
use swingbot::domain::ports::MarketDataFeed;
use swingbot::domain::trading::ledger::Ledger;
use swingbot::infrastructure::mock::{MockExecutionSink, MockMarketDataFeed, ScriptedHistory};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let config = Config::from_env()?;
    info!(
        "Starting swingbot in {:?} mode for {:?} ({} decisions)",
        config.mode, config.symbols, config.decision_timeframe
    );

    let router: Arc<dyn OrderRouter> = match config.mode {
        Mode::Simulate => {
            let ledger = Arc::new(RwLock::new(Ledger::new(config.initial_cash)));
            Arc::new(SimulatedRouter::new(ledger))
        }
        // Wired against the in-memory sink until a broker adapter lands;
        // swap the Arc here to go live against a real venue.
        Mode::Live => Arc::new(LiveRouter::new(Arc::new(MockExecutionSink::new()))),
    };

    let mut orchestrator = TradingOrchestrator::new(
        CandleAggregator::new(config.decision_timeframe),
        IndicatorEngine::new(config.indicators.clone()),
        router,
        config.trade_quantity,
        Duration::from_secs(config.report_interval_secs),
        config.backfill_days,
    );

    let history = ScriptedHistory::new();
    orchestrator.warmup(&history, &config.symbols).await;

    let feed = MockMarketDataFeed::new();
    let events = feed.subscribe(config.symbols.clone()).await?;

    tokio::select! {
        _ = orchestrator.run(events) => {}
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    Ok(())
}
