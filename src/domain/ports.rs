use crate::domain::market::types::{Candle, MarketEvent, OrderRequest};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;

/// Live feed of per-minute observations, one receiver per subscription.
/// Producers guarantee non-decreasing timestamps per symbol; there is no
/// cross-symbol ordering guarantee.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    async fn subscribe(&self, symbols: Vec<String>) -> Result<Receiver<MarketEvent>>;
}

/// Historical backfill collaborator. Returns minute bars in ascending
/// timestamp order; an empty batch means no data was available, which the
/// core tolerates by proceeding with partial history.
#[async_trait]
pub trait HistoricalData: Send + Sync {
    async fn minute_bars(&self, symbol: &str, days: u32) -> Result<Vec<Candle>>;
}

/// Order-execution sink for live mode. The core interprets only
/// success/failure, never broker-specific payloads.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    async fn execute(&self, order: &OrderRequest) -> Result<()>;
}
