// keys-core: creator key market. bonding curve pricing, holdings ledger,
// portfolio marks and key-holder room access.
// all pricing is integer math on minor units; decimals only appear at the edges.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: UserId, CreatorId, Amount, SharePercent, Denomination
//   1.9  clock.rs: wall clock and a manual clock for tests
//   2.x  curve.rs: linear curve, closed-form buy cost and sell proceeds
//   3.x  revenue.rs: creator/protocol split, sell fee
//   4.x  holding.rs: holding quantity + cost basis, buy/sell transitions
//   5.x  trade.rs: immutable trade records, price history folds
//   5.5  creator.rs: creator profile, derived key view
//   6.x  store/: ledger store trait, sharded memory store, snapshot store
//   7.x  access.rs: room access from current holdings
//   7.5  portfolio.rs: mark-to-curve valuation
//   8.x  engine/: buy, sell, quotes, admin share changes, per-creator locks
//   9.x  config.rs: TOML + env config, presets, creator seeds
//   10.x api.rs: route parsing and dispatch for the presentation layer

// market modules
pub mod clock;
pub mod creator;
pub mod curve;
pub mod holding;
pub mod revenue;
pub mod trade;
pub mod types;

// ledger and engine
pub mod access;
pub mod engine;
pub mod portfolio;
pub mod store;

// integration modules
pub mod api;
pub mod config;

// re exports for convenience
pub use api::{handle, handle_json, ApiError, ApiRequest, ApiResponse, ErrorCode};
pub use clock::*;
pub use config::{Config, ConfigError, CreatorSeed, StoreBackend};
pub use creator::*;
pub use curve::*;
pub use engine::*;
pub use holding::*;
pub use portfolio::{Portfolio, PositionValue, ValuationError};
pub use revenue::RevenueSplit;
pub use store::*;
pub use trade::*;
pub use types::*;
