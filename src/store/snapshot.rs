//! Durable single-writer store with periodic snapshots.
//!
//! Wraps [`MemoryStore`] and writes the whole ledger as JSON every
//! `snapshot_every` trade commits. Onboarding and revenue-share changes are
//! always persisted. A commit that falls on a snapshot boundary is written to
//! disk before it is made visible; if the write fails the commit is refused
//! and memory keeps the pre-commit state.
//!
//! Commits between snapshots live only in memory until the next boundary or
//! an explicit [`SnapshotStore::flush`].

use super::{
    CreatorShard, KeySnapshot, LedgerStore, MemoryStore, PositionSnapshot, StoreError, StoreResult,
    TradeCommit,
};
use crate::creator::Creator;
use crate::holding::Holding;
use crate::trade::{RevenueShareChange, Trade};
use crate::types::{CreatorId, Timestamp, UserId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub shards: Vec<CreatorShard>,
    pub next_trade_id: u64,
}

#[derive(Debug)]
pub struct SnapshotStore {
    inner: MemoryStore,
    path: PathBuf,
    snapshot_every: u64,
    commits: AtomicU64,
    // taken before any shard lock, so two persisting writers can't wait on each other's shards
    persist_lock: Mutex<()>,
}

impl SnapshotStore {
    /// Opens `path`, restoring the ledger if a snapshot is already there.
    pub fn open(path: impl AsRef<Path>, snapshot_every: u64) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let bytes = std::fs::read(&path)
                .map_err(|e| StoreError::Unavailable(format!("read {}: {e}", path.display())))?;
            let file: SnapshotFile = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupt(format!("parse {}: {e}", path.display())))?;
            let restored = MemoryStore::from_snapshot(file)?;
            tracing::info!(path = %path.display(), "restored ledger snapshot");
            restored
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("create {}: {e}", parent.display()))
                })?;
            }
            MemoryStore::new()
        };

        Ok(Self {
            inner,
            path,
            snapshot_every: snapshot_every.max(1),
            commits: AtomicU64::new(0),
            persist_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current state regardless of the commit counter.
    pub fn flush(&self) -> StoreResult<()> {
        let _persist = self.persist_lock.lock();
        self.write_file(&self.inner.export(None))?;
        self.commits.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn write_file(&self, file: &SnapshotFile) -> StoreResult<()> {
        let bytes = serde_json::to_vec(file)
            .map_err(|e| StoreError::Corrupt(format!("serialize snapshot: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &bytes)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "snapshot write failed");
                StoreError::Unavailable(format!("write {}: {e}", self.path.display()))
            })?;
        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    // apply `f` to a copy of the shard, persist the copy, then publish it
    fn persisted_update<T>(
        &self,
        creator: &CreatorId,
        f: impl FnOnce(&mut CreatorShard) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let _persist = self.persist_lock.lock();
        let handle = self
            .inner
            .shard(creator)
            .ok_or_else(|| StoreError::UnknownCreator(creator.clone()))?;
        let mut shard = handle.write();

        let mut next = shard.clone();
        let out = f(&mut next)?;
        self.write_file(&self.inner.export(Some(&next)))?;
        *shard = next;
        self.commits.store(0, Ordering::SeqCst);
        Ok(out)
    }
}

impl LedgerStore for SnapshotStore {
    fn insert_creator(&self, creator: Creator) -> StoreResult<()> {
        let _persist = self.persist_lock.lock();
        if self.inner.contains(&creator.id) {
            return Err(StoreError::DuplicateCreator(creator.id));
        }
        let shard = CreatorShard::new(creator);
        self.write_file(&self.inner.export(Some(&shard)))?;
        self.inner.insert_shard(shard)
    }

    fn creator(&self, id: &CreatorId) -> StoreResult<Option<Creator>> {
        self.inner.creator(id)
    }

    fn creators(&self) -> StoreResult<Vec<Creator>> {
        self.inner.creators()
    }

    fn key_supply(&self, id: &CreatorId) -> StoreResult<Option<u64>> {
        self.inner.key_supply(id)
    }

    fn key_snapshot(&self, id: &CreatorId) -> StoreResult<Option<KeySnapshot>> {
        self.inner.key_snapshot(id)
    }

    fn last_trade_at(&self, id: &CreatorId) -> StoreResult<Option<Timestamp>> {
        self.inner.last_trade_at(id)
    }

    fn holding(&self, user: &UserId, creator: &CreatorId) -> StoreResult<Option<Holding>> {
        self.inner.holding(user, creator)
    }

    fn positions(&self, user: &UserId) -> StoreResult<Vec<PositionSnapshot>> {
        self.inner.positions(user)
    }

    fn holders(&self, creator: &CreatorId) -> StoreResult<Vec<Holding>> {
        self.inner.holders(creator)
    }

    fn trades(&self, creator: &CreatorId) -> StoreResult<Vec<Trade>> {
        self.inner.trades(creator)
    }

    fn user_trades(&self, user: &UserId) -> StoreResult<Vec<Trade>> {
        self.inner.user_trades(user)
    }

    fn commit_trade(&self, commit: TradeCommit) -> StoreResult<Trade> {
        let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        if n < self.snapshot_every {
            return self.inner.commit_trade(commit);
        }
        let creator = commit.draft.creator_id.clone();
        self.persisted_update(&creator, |shard| {
            shard.apply_trade(commit, || self.inner.take_trade_id())
        })
    }

    fn set_revenue_share(&self, change: RevenueShareChange) -> StoreResult<()> {
        let creator = change.creator_id.clone();
        self.persisted_update(&creator, |shard| shard.apply_share_change(change))
    }

    fn revenue_share_log(&self, creator: &CreatorId) -> StoreResult<Vec<RevenueShareChange>> {
        self.inner.revenue_share_log(creator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveConfig;
    use crate::engine::{Engine, EngineConfig, EngineError};
    use crate::types::{Amount, SharePercent};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn engine_on(store: &Arc<SnapshotStore>) -> Engine {
        Engine::new(EngineConfig::default(), store.clone())
    }

    fn buy_one(engine: &Engine, user: &str) {
        engine
            .buy(&UserId::new(user), &CreatorId::new("a"), 1, Amount::new(u128::MAX))
            .unwrap();
    }

    fn creator(id: &str) -> Creator {
        Creator::new(
            CreatorId::new(id),
            id,
            CurveConfig::new(Amount::new(10), Amount::new(1), Some(100)),
            SharePercent::new(12).unwrap(),
        )
    }

    #[test]
    fn creators_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");

        {
            let store = SnapshotStore::open(&path, 10).unwrap();
            store.insert_creator(creator("a")).unwrap();
            store.insert_creator(creator("b")).unwrap();
        }

        let reopened = SnapshotStore::open(&path, 10).unwrap();
        let mut ids: Vec<_> = reopened
            .creators()
            .unwrap()
            .into_iter()
            .map(|c| c.id.0)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn duplicate_rejected_before_write() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path().join("ledger.json"), 1).unwrap();
        store.insert_creator(creator("a")).unwrap();
        assert!(matches!(
            store.insert_creator(creator("a")),
            Err(StoreError::DuplicateCreator(_))
        ));
    }

    #[test]
    fn unwritable_path_refuses_onboarding() {
        let dir = TempDir::new().unwrap();
        // the snapshot path is a directory, so the final rename fails
        let path = dir.path().join("occupied");
        std::fs::create_dir_all(path.join("inner")).unwrap();
        let store = SnapshotStore {
            inner: MemoryStore::new(),
            path,
            snapshot_every: 1,
            commits: AtomicU64::new(0),
            persist_lock: Mutex::new(()),
        };

        assert!(matches!(
            store.insert_creator(creator("a")),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.creators().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            SnapshotStore::open(&path, 1),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn failed_write_refuses_the_commit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let store = Arc::new(SnapshotStore::open(&path, 1).unwrap());
        let engine = engine_on(&store);
        engine.register_creator(creator("a")).unwrap();

        // a directory where the snapshot should go makes the rename fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir_all(path.join("inner")).unwrap();

        let err = engine
            .buy(&UserId::new("u"), &CreatorId::new("a"), 2, Amount::new(u128::MAX))
            .unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));

        let id = CreatorId::new("a");
        assert_eq!(store.key_supply(&id).unwrap(), Some(0));
        assert!(store.holding(&UserId::new("u"), &id).unwrap().is_none());
        assert!(store.holders(&id).unwrap().is_empty());
        assert!(store.trades(&id).unwrap().is_empty());
    }

    #[test]
    fn commits_persist_on_the_snapshot_boundary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let store = Arc::new(SnapshotStore::open(&path, 3).unwrap());
        let engine = engine_on(&store);
        engine.register_creator(creator("a")).unwrap();
        let id = CreatorId::new("a");

        buy_one(&engine, "u1");
        buy_one(&engine, "u2");
        assert_eq!(store.key_supply(&id).unwrap(), Some(2));

        // two commits in, only the onboarding has reached disk
        let early = SnapshotStore::open(&path, 3).unwrap();
        assert_eq!(early.key_supply(&id).unwrap(), Some(0));
        assert!(early.trades(&id).unwrap().is_empty());

        buy_one(&engine, "u3");
        let later = SnapshotStore::open(&path, 3).unwrap();
        assert_eq!(later.key_supply(&id).unwrap(), Some(3));
        assert_eq!(later.trades(&id).unwrap().len(), 3);
        assert_eq!(later.holders(&id).unwrap().len(), 3);
    }

    #[test]
    fn flush_writes_commits_between_snapshots() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let store = Arc::new(SnapshotStore::open(&path, 10).unwrap());
        let engine = engine_on(&store);
        engine.register_creator(creator("a")).unwrap();
        let id = CreatorId::new("a");

        buy_one(&engine, "u1");
        buy_one(&engine, "u1");
        assert!(SnapshotStore::open(&path, 10).unwrap().trades(&id).unwrap().is_empty());

        store.flush().unwrap();
        let reopened = SnapshotStore::open(&path, 10).unwrap();
        assert_eq!(reopened.key_supply(&id).unwrap(), Some(2));
        let trades = reopened.trades(&id).unwrap();
        assert_eq!(trades, store.trades(&id).unwrap());
        assert_eq!(
            reopened.holding(&UserId::new("u1"), &id).unwrap().map(|h| h.quantity),
            Some(2)
        );

        // ids keep counting past what was restored
        let next = reopened.inner.take_trade_id();
        assert!(trades.iter().all(|t| t.id < next));
    }
}
