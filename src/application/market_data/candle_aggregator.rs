use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::types::Candle;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
struct OpenBucket {
    start: i64,
    close: Decimal,
    volume: Decimal,
    last_tick: i64,
}

/// Converts per-minute ticks into closed candles of one higher timeframe,
/// one open bucket per symbol.
///
/// Ticks must arrive in non-decreasing timestamp order per symbol; an
/// out-of-order tick is a data gap and is dropped without touching the open
/// bucket. Finalization fires exactly once per bucket transition.
pub struct CandleAggregator {
    timeframe: Timeframe,
    buckets: HashMap<String, OpenBucket>,
}

impl CandleAggregator {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            buckets: HashMap::new(),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Processes one tick. Returns the finalized candle when the tick opens a
    /// new bucket, `None` otherwise.
    pub fn ingest(
        &mut self,
        symbol: &str,
        close: Decimal,
        volume: Decimal,
        timestamp_ms: i64,
    ) -> Option<Candle> {
        if Utc.timestamp_millis_opt(timestamp_ms).single().is_none() {
            error!(
                "CandleAggregator: invalid timestamp {} for {}",
                timestamp_ms, symbol
            );
            return None;
        }

        let bucket_start = self.timeframe.period_start(timestamp_ms);

        let Some(bucket) = self.buckets.get_mut(symbol) else {
            debug!(
                "CandleAggregator: {} first tick @ {}, opening {} bucket",
                symbol, close, self.timeframe
            );
            self.buckets.insert(
                symbol.to_string(),
                OpenBucket {
                    start: bucket_start,
                    close,
                    volume,
                    last_tick: timestamp_ms,
                },
            );
            return None;
        };

        if timestamp_ms < bucket.last_tick {
            warn!(
                "CandleAggregator: {} out-of-order tick dropped ({} < {})",
                symbol, timestamp_ms, bucket.last_tick
            );
            return None;
        }

        if bucket_start == bucket.start {
            bucket.close = close;
            bucket.volume += volume;
            bucket.last_tick = timestamp_ms;
            return None;
        }

        // Bucket transition: finalize the previous period, seed the new one
        // with the current tick.
        let candle = Candle {
            symbol: symbol.to_string(),
            close: bucket.close,
            volume: bucket.volume,
            timestamp: bucket.start,
        };
        *bucket = OpenBucket {
            start: bucket_start,
            close,
            volume,
            last_tick: timestamp_ms,
        };
        info!(
            "CandleAggregator: {} {} candle closed C:{} V:{}",
            symbol, self.timeframe, candle.close, candle.volume
        );
        Some(candle)
    }

    /// Discards any open bucket for `symbol`, as if it was never observed.
    /// Used when a backfill replay has to start over.
    pub fn reset_symbol(&mut self, symbol: &str) {
        self.buckets.remove(symbol);
    }
}
