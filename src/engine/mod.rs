// 8.0: market engine. validates and executes buys and sells against the curve and
// the ledger store. trades on one creator are serialized by that creator's lock;
// trades on different creators run in parallel.

mod admin;
mod config;
mod core;
mod locks;
mod quotes;
mod results;
mod trades;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{EngineError, TradeQuote};
