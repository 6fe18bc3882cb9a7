//! Environment-driven configuration.
//!
//! Everything is read once at startup via `Config::from_env`; `.env` files
//! are honored through dotenvy in the binary.

use crate::application::market_data::indicator_engine::IndicatorConfig;
use crate::domain::market::timeframe::Timeframe;
use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Order routing mode: apply fills to the in-memory ledger, or forward
/// instructions to an external execution sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Simulate,
    Live,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sim" | "simulate" => Ok(Mode::Simulate),
            "live" => Ok(Mode::Live),
            _ => bail!("Invalid MODE: {}. Must be 'simulate' or 'live'", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub symbols: Vec<String>,
    pub initial_cash: Decimal,
    pub trade_quantity: Decimal,
    pub report_interval_secs: u64,
    pub decision_timeframe: Timeframe,
    pub backfill_days: u32,
    pub indicators: IndicatorConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mode = env::var("MODE")
            .unwrap_or_else(|_| "simulate".to_string())
            .parse::<Mode>()?;

        let symbols: Vec<String> = env::var("SYMBOLS")
            .unwrap_or_else(|_| "TSLA".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            bail!("SYMBOLS must name at least one symbol");
        }

        let initial_cash: Decimal = env::var("INITIAL_CASH")
            .unwrap_or_else(|_| "100000".to_string())
            .parse()
            .context("Invalid INITIAL_CASH")?;
        if initial_cash < Decimal::ZERO {
            bail!("INITIAL_CASH must be non-negative");
        }

        let trade_quantity: Decimal = env::var("TRADE_QUANTITY")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .context("Invalid TRADE_QUANTITY")?;
        if trade_quantity <= Decimal::ZERO {
            bail!("TRADE_QUANTITY must be positive");
        }

        let decision_timeframe = env::var("DECISION_TIMEFRAME")
            .unwrap_or_else(|_| "1Hour".to_string())
            .parse::<Timeframe>()?;

        let defaults = IndicatorConfig::default();
        let indicators = IndicatorConfig {
            short_ma_period: env_or("SHORT_MA_PERIOD", defaults.short_ma_period)?,
            long_ma_period: env_or("LONG_MA_PERIOD", defaults.long_ma_period)?,
            rsi_period: env_or("RSI_PERIOD", defaults.rsi_period)?,
            macd_fast_period: env_or("MACD_FAST_PERIOD", defaults.macd_fast_period)?,
            macd_slow_period: env_or("MACD_SLOW_PERIOD", defaults.macd_slow_period)?,
            macd_signal_period: env_or("MACD_SIGNAL_PERIOD", defaults.macd_signal_period)?,
            bollinger_period: env_or("BOLLINGER_PERIOD", defaults.bollinger_period)?,
            bollinger_std_dev: env_or("BOLLINGER_STD_DEV", defaults.bollinger_std_dev)?,
        };
        if indicators.short_ma_period >= indicators.long_ma_period {
            bail!("SHORT_MA_PERIOD must be less than LONG_MA_PERIOD");
        }
        if indicators.macd_fast_period >= indicators.macd_slow_period {
            bail!("MACD_FAST_PERIOD must be less than MACD_SLOW_PERIOD");
        }

        Ok(Self {
            mode,
            symbols,
            initial_cash,
            trade_quantity,
            report_interval_secs: env_or("REPORT_INTERVAL_SECS", 300)?,
            decision_timeframe,
            backfill_days: env_or("BACKFILL_DAYS", 5)?,
            indicators,
        })
    }
}
