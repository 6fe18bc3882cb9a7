pub mod market_data;
pub mod orchestrator;
pub mod signal;
