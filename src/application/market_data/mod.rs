pub mod candle_aggregator;
pub mod indicator_engine;
