use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Trading decision derived from an indicator snapshot. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// The order side this signal maps to, if it is actionable.
    pub fn side(&self) -> Option<OrderSide> {
        match self {
            Signal::Buy => Some(OrderSide::Buy),
            Signal::Sell => Some(OrderSide::Sell),
            Signal::Hold => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

/// A closed candle: last close and accumulated volume over one period,
/// stamped with the period start in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: i64,
}

/// Inbound market event. Ticks carry per-minute close/volume observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
    Tick {
        symbol: String,
        close: Decimal,
        volume: Decimal,
        timestamp: i64,
    },
}

/// The only payload an execution sink sees. Price is decided by the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub symbol: String,
    pub quantity: Decimal,
}
