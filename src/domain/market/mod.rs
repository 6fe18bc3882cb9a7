pub mod timeframe;
pub mod types;
