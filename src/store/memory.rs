//! In-memory ledger store.
//!
//! Each creator shard sits behind its own `RwLock`; the shard map itself is
//! only write-locked when a creator is onboarded. Readers take a shard's read
//! lock, so a holding and the supply it is valued against always come from
//! the same committed state.

use super::{
    CreatorShard, KeySnapshot, LedgerStore, PositionSnapshot, SnapshotFile, StoreError, StoreResult,
    TradeCommit,
};
use crate::creator::Creator;
use crate::holding::Holding;
use crate::trade::{RevenueShareChange, Trade};
use crate::types::{CreatorId, Timestamp, TradeId, UserId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) type ShardHandle = Arc<RwLock<CreatorShard>>;

#[derive(Debug)]
pub struct MemoryStore {
    shards: RwLock<BTreeMap<CreatorId, ShardHandle>>,
    next_trade_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shards: RwLock::new(BTreeMap::new()),
            next_trade_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn from_snapshot(file: SnapshotFile) -> StoreResult<Self> {
        let mut shards = BTreeMap::new();
        let mut max_id = 0;
        for shard in file.shards {
            shard.verify()?;
            max_id = shard.trades.iter().map(|t| t.id.0).fold(max_id, u64::max);
            let id = shard.creator.id.clone();
            if shards.insert(id.clone(), Arc::new(RwLock::new(shard))).is_some() {
                return Err(StoreError::Corrupt(format!("creator {id} appears twice in snapshot")));
            }
        }
        Ok(Self {
            shards: RwLock::new(shards),
            next_trade_id: AtomicU64::new(file.next_trade_id.max(max_id + 1)),
        })
    }

    pub(crate) fn shard(&self, id: &CreatorId) -> Option<ShardHandle> {
        self.shards.read().get(id).cloned()
    }

    fn require_shard(&self, id: &CreatorId) -> StoreResult<ShardHandle> {
        self.shard(id).ok_or_else(|| StoreError::UnknownCreator(id.clone()))
    }

    fn all_shards(&self) -> Vec<ShardHandle> {
        self.shards.read().values().cloned().collect()
    }

    pub(crate) fn take_trade_id(&self) -> TradeId {
        TradeId(self.next_trade_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Copy of the whole ledger. `replacing` substitutes one shard's state, used to
    /// persist a commit before it becomes visible.
    pub(crate) fn export(&self, replacing: Option<&CreatorShard>) -> SnapshotFile {
        let handles: Vec<(CreatorId, ShardHandle)> = self
            .shards
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        // the replaced shard is never locked here: its writer may be the caller
        let mut shards = Vec::with_capacity(handles.len() + 1);
        for (id, handle) in handles {
            match replacing {
                Some(r) if r.creator.id == id => shards.push(r.clone()),
                _ => shards.push(handle.read().clone()),
            }
        }
        if let Some(r) = replacing {
            if !shards.iter().any(|s| s.creator.id == r.creator.id) {
                shards.push(r.clone());
            }
        }
        SnapshotFile {
            shards,
            next_trade_id: self.next_trade_id.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn insert_shard(&self, shard: CreatorShard) -> StoreResult<()> {
        let mut shards = self.shards.write();
        let id = shard.creator.id.clone();
        if shards.contains_key(&id) {
            return Err(StoreError::DuplicateCreator(id));
        }
        shards.insert(id, Arc::new(RwLock::new(shard)));
        Ok(())
    }

    pub(crate) fn contains(&self, id: &CreatorId) -> bool {
        self.shards.read().contains_key(id)
    }
}

impl LedgerStore for MemoryStore {
    fn insert_creator(&self, creator: Creator) -> StoreResult<()> {
        self.insert_shard(CreatorShard::new(creator))
    }

    fn creator(&self, id: &CreatorId) -> StoreResult<Option<Creator>> {
        Ok(self.shard(id).as_ref().map(|s| s.read().creator.clone()))
    }

    fn creators(&self) -> StoreResult<Vec<Creator>> {
        Ok(self
            .all_shards()
            .iter()
            .map(|s| s.read().creator.clone())
            .collect())
    }

    fn key_supply(&self, id: &CreatorId) -> StoreResult<Option<u64>> {
        Ok(self.shard(id).as_ref().map(|s| s.read().total_supply))
    }

    fn key_snapshot(&self, id: &CreatorId) -> StoreResult<Option<KeySnapshot>> {
        Ok(self.shard(id).map(|handle| {
            let shard = handle.read();
            KeySnapshot {
                creator: shard.creator.clone(),
                total_supply: shard.total_supply,
                trades: shard.trades.clone(),
                holder_count: shard.holder_count(),
            }
        }))
    }

    fn last_trade_at(&self, id: &CreatorId) -> StoreResult<Option<Timestamp>> {
        let handle = self.require_shard(id)?;
        let shard = handle.read();
        Ok(shard.trades.last().map(|t| t.timestamp))
    }

    fn holding(&self, user: &UserId, creator: &CreatorId) -> StoreResult<Option<Holding>> {
        Ok(self
            .shard(creator)
            .as_ref()
            .and_then(|s| s.read().holdings.get(user).cloned()))
    }

    fn positions(&self, user: &UserId) -> StoreResult<Vec<PositionSnapshot>> {
        Ok(self
            .all_shards()
            .iter()
            .filter_map(|s| s.read().position(user))
            .collect())
    }

    fn holders(&self, creator: &CreatorId) -> StoreResult<Vec<Holding>> {
        let handle = self.require_shard(creator)?;
        let shard = handle.read();
        Ok(shard
            .holdings
            .values()
            .filter(|h| !h.is_empty())
            .cloned()
            .collect())
    }

    fn trades(&self, creator: &CreatorId) -> StoreResult<Vec<Trade>> {
        let handle = self.require_shard(creator)?;
        let trades = handle.read().trades.clone();
        Ok(trades)
    }

    fn user_trades(&self, user: &UserId) -> StoreResult<Vec<Trade>> {
        let mut trades: Vec<Trade> = self
            .all_shards()
            .iter()
            .flat_map(|s| {
                s.read()
                    .trades
                    .iter()
                    .filter(|t| &t.user_id == user)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        trades.sort_by_key(|t| (t.timestamp, t.id));
        Ok(trades)
    }

    fn commit_trade(&self, commit: TradeCommit) -> StoreResult<Trade> {
        let handle = self.require_shard(&commit.draft.creator_id)?;
        let mut shard = handle.write();
        shard.apply_trade(commit, || self.take_trade_id())
    }

    fn set_revenue_share(&self, change: RevenueShareChange) -> StoreResult<()> {
        let handle = self.require_shard(&change.creator_id)?;
        let mut shard = handle.write();
        shard.apply_share_change(change)
    }

    fn revenue_share_log(&self, creator: &CreatorId) -> StoreResult<Vec<RevenueShareChange>> {
        let handle = self.require_shard(creator)?;
        let log = handle.read().share_log.clone();
        Ok(log)
    }
}
