use crate::domain::market::types::{Candle, MarketEvent, OrderRequest};
use crate::domain::ports::{ExecutionSink, HistoricalData, MarketDataFeed};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{
    Mutex, RwLock,
    mpsc::{self, Receiver, Sender},
};
use tracing::info;

/// In-memory feed for tests and the headless demo binary: events published
/// here fan out to every subscriber.
#[derive(Clone, Default)]
pub struct MockMarketDataFeed {
    subscribers: Arc<RwLock<Vec<Sender<MarketEvent>>>>,
}

impl MockMarketDataFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, event: MarketEvent) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.retain(|tx| !tx.is_closed());
        for tx in subscribers.iter() {
            let _ = tx.send(event.clone()).await;
        }
    }
}

#[async_trait]
impl MarketDataFeed for MockMarketDataFeed {
    async fn subscribe(&self, symbols: Vec<String>) -> Result<Receiver<MarketEvent>> {
        info!("MockMarketDataFeed: subscription for {:?}", symbols);
        let (tx, rx) = mpsc::channel(256);
        self.subscribers.write().await.push(tx);
        Ok(rx)
    }
}

/// Execution sink that records every order and can be switched to reject.
#[derive(Default)]
pub struct MockExecutionSink {
    orders: RwLock<Vec<OrderRequest>>,
    reject: RwLock<bool>,
}

impl MockExecutionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_reject(&self, reject: bool) {
        *self.reject.write().await = reject;
    }

    pub async fn orders(&self) -> Vec<OrderRequest> {
        self.orders.read().await.clone()
    }
}

#[async_trait]
impl ExecutionSink for MockExecutionSink {
    async fn execute(&self, order: &OrderRequest) -> Result<()> {
        if *self.reject.read().await {
            bail!("order rejected by venue");
        }
        self.orders.write().await.push(order.clone());
        Ok(())
    }
}

/// Canned backfill batches, served in the order they were scripted per
/// symbol. Once a symbol's script runs dry it returns empty batches, which
/// the core treats as "no data available".
#[derive(Default)]
pub struct ScriptedHistory {
    batches: Mutex<HashMap<String, VecDeque<Vec<Candle>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn script(&self, symbol: &str, bars: Vec<Candle>) {
        self.batches
            .lock()
            .await
            .entry(symbol.to_string())
            .or_default()
            .push_back(bars);
    }

    pub async fn calls(&self, symbol: &str) -> usize {
        self.calls.lock().await.get(symbol).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HistoricalData for ScriptedHistory {
    async fn minute_bars(&self, symbol: &str, _days: u32) -> Result<Vec<Candle>> {
        *self
            .calls
            .lock()
            .await
            .entry(symbol.to_string())
            .or_insert(0) += 1;
        Ok(self
            .batches
            .lock()
            .await
            .get_mut(symbol)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_default())
    }
}
