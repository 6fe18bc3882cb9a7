use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle aggregation intervals supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    FiveMin,
    FifteenMin,
    OneHour,
    OneDay,
}

impl Timeframe {
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::OneHour => 60,
            Timeframe::OneDay => 1440,
        }
    }

    pub fn to_seconds(&self) -> i64 {
        (self.to_minutes() * 60) as i64
    }

    /// Returns the start timestamp (ms) of the period containing `timestamp_ms`.
    ///
    /// Daily periods start at midnight UTC; everything else rounds down to the
    /// nearest period boundary.
    pub fn period_start(&self, timestamp_ms: i64) -> i64 {
        let timestamp_sec = timestamp_ms / 1000;
        let period_sec = self.to_seconds();
        let period_start_sec = timestamp_sec - (timestamp_sec % period_sec);
        period_start_sec * 1000
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1m" | "1min" | "onemin" => Ok(Timeframe::OneMin),
            "5m" | "5min" | "fivemin" => Ok(Timeframe::FiveMin),
            "15m" | "15min" | "fifteenmin" => Ok(Timeframe::FifteenMin),
            "1h" | "1hour" | "onehour" => Ok(Timeframe::OneHour),
            "1d" | "1day" | "oneday" => Ok(Timeframe::OneDay),
            _ => Err(anyhow!(
                "Invalid timeframe: '{}'. Valid options: 1Min, 5Min, 15Min, 1Hour, 1Day",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::OneMin => "1Min",
            Timeframe::FiveMin => "5Min",
            Timeframe::FifteenMin => "15Min",
            Timeframe::OneHour => "1Hour",
            Timeframe::OneDay => "1Day",
        };
        write!(f, "{}", s)
    }
}
