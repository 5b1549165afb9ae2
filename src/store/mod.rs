//! Ledger store: the only place mutable market state lives.
//!
//! Three logical tables: keys (creator + supply), holdings, trades. Every
//! implementation must apply a [`TradeCommit`] all-or-nothing and must serve
//! reads from a consistent snapshot, at least per (key, holding) pair.
//!
//! State is sharded by creator. A commit only touches its own creator's shard,
//! so trades on different keys never wait on each other.

mod memory;
mod shard;
mod snapshot;

pub use memory::MemoryStore;
pub use shard::CreatorShard;
pub use snapshot::{SnapshotFile, SnapshotStore};

use crate::creator::Creator;
use crate::curve::CurveConfig;
use crate::holding::Holding;
use crate::trade::{RevenueShareChange, Trade, TradeDraft};
use crate::types::{CreatorId, Timestamp, UserId};

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything one trade changes. The store re-checks the expectations against its own
/// state before applying, so a commit computed from a stale read is refused.
#[derive(Debug, Clone)]
pub struct TradeCommit {
    pub draft: TradeDraft,
    pub expected_supply: u64,
    pub expected_quantity: u64,
    /// The holding as it should look after the trade.
    pub holding: Holding,
}

/// One holding joined with the key it is in, read together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSnapshot {
    pub holding: Holding,
    pub curve: CurveConfig,
    pub total_supply: u64,
}

/// A creator's key as of one instant.
#[derive(Debug, Clone)]
pub struct KeySnapshot {
    pub creator: Creator,
    pub total_supply: u64,
    pub trades: Vec<Trade>,
    pub holder_count: usize,
}

pub trait LedgerStore: Send + Sync {
    fn insert_creator(&self, creator: Creator) -> StoreResult<()>;

    fn creator(&self, id: &CreatorId) -> StoreResult<Option<Creator>>;

    fn creators(&self) -> StoreResult<Vec<Creator>>;

    fn key_supply(&self, id: &CreatorId) -> StoreResult<Option<u64>>;

    fn key_snapshot(&self, id: &CreatorId) -> StoreResult<Option<KeySnapshot>>;

    fn last_trade_at(&self, id: &CreatorId) -> StoreResult<Option<Timestamp>>;

    fn holding(&self, user: &UserId, creator: &CreatorId) -> StoreResult<Option<Holding>>;

    /// Non-empty holdings of `user`, each paired with its key's supply.
    fn positions(&self, user: &UserId) -> StoreResult<Vec<PositionSnapshot>>;

    fn holders(&self, creator: &CreatorId) -> StoreResult<Vec<Holding>>;

    fn trades(&self, creator: &CreatorId) -> StoreResult<Vec<Trade>>;

    fn user_trades(&self, user: &UserId) -> StoreResult<Vec<Trade>>;

    fn commit_trade(&self, commit: TradeCommit) -> StoreResult<Trade>;

    fn set_revenue_share(&self, change: RevenueShareChange) -> StoreResult<()>;

    fn revenue_share_log(&self, creator: &CreatorId) -> StoreResult<Vec<RevenueShareChange>>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Commit conflict: {0}")]
    Conflict(String),

    #[error("Unknown creator {0}")]
    UnknownCreator(CreatorId),

    #[error("Creator {0} already exists")]
    DuplicateCreator(CreatorId),

    #[error("Invariant violated: {0}")]
    Corrupt(String),
}
