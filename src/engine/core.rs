// 8.0 engine/core.rs: main engine. owns the store handle, the clock and the
// per-creator lock registry. all market state lives in the store.

use super::config::EngineConfig;
use super::locks::KeyLocks;
use super::results::EngineError;
use crate::access;
use crate::clock::{Clock, SystemClock};
use crate::creator::{Creator, KeyView};
use crate::holding::Holding;
use crate::portfolio::{self, Portfolio};
use crate::store::{LedgerStore, MemoryStore};
use crate::trade::{RevenueShareChange, Trade};
use crate::types::{CreatorId, Timestamp, UserId};
use std::sync::Arc;

/** 8.1: main engine struct. shared between request threads by reference */
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) store: Arc<dyn LedgerStore>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) locks: KeyLocks,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(config: EngineConfig, store: Arc<dyn LedgerStore>) -> Self {
        Self {
            config,
            store,
            clock: Arc::new(SystemClock),
            locks: KeyLocks::default(),
        }
    }

    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Onboards a creator together with an empty key.
    pub fn register_creator(&self, mut creator: Creator) -> Result<Creator, EngineError> {
        creator.validate().map_err(|e| EngineError::InvalidCurve(e.to_string()))?;
        creator.created_at = self.clock.now();

        self.store.insert_creator(creator.clone()).map_err(|e| {
            tracing::warn!(creator = %creator.id, error = %e, "onboarding failed");
            EngineError::from(e)
        })?;

        tracing::info!(
            creator = %creator.id,
            username = %creator.username,
            revenue_share = %creator.revenue_share,
            "creator onboarded"
        );
        Ok(creator)
    }

    pub fn creator(&self, id: &CreatorId) -> Result<Creator, EngineError> {
        self.store
            .creator(id)?
            .ok_or_else(|| EngineError::CreatorNotFound(id.clone()))
    }

    pub fn creators(&self) -> Result<Vec<Creator>, EngineError> {
        Ok(self.store.creators()?)
    }

    /// Current state of a creator's key, all of it read from one snapshot.
    pub fn key(&self, id: &CreatorId) -> Result<KeyView, EngineError> {
        let snapshot = self
            .store
            .key_snapshot(id)?
            .ok_or_else(|| EngineError::CreatorNotFound(id.clone()))?;
        Ok(KeyView::derive(
            &snapshot.creator,
            snapshot.total_supply,
            &snapshot.trades,
            snapshot.holder_count,
        )?)
    }

    pub fn holding(&self, user: &UserId, creator: &CreatorId) -> Result<Option<Holding>, EngineError> {
        Ok(self.store.holding(user, creator)?)
    }

    pub fn holders(&self, creator: &CreatorId) -> Result<Vec<Holding>, EngineError> {
        Ok(self.store.holders(creator)?)
    }

    pub fn trades(&self, creator: &CreatorId) -> Result<Vec<Trade>, EngineError> {
        Ok(self.store.trades(creator)?)
    }

    pub fn user_trades(&self, user: &UserId) -> Result<Vec<Trade>, EngineError> {
        Ok(self.store.user_trades(user)?)
    }

    pub fn revenue_share_log(&self, creator: &CreatorId) -> Result<Vec<RevenueShareChange>, EngineError> {
        Ok(self.store.revenue_share_log(creator)?)
    }

    pub fn portfolio(&self, user: &UserId) -> Result<Portfolio, EngineError> {
        Ok(portfolio::valuation(self.store.as_ref(), user)?)
    }

    pub fn has_access(&self, user: &UserId, creator: &CreatorId) -> Result<bool, EngineError> {
        Ok(access::has_access(self.store.as_ref(), user, creator)?)
    }

    pub fn accessible_rooms(&self, user: &UserId) -> Result<Vec<Creator>, EngineError> {
        Ok(access::accessible_rooms(self.store.as_ref(), user)?)
    }

    // 8.2: runs `f` holding the creator's lock. an unknown creator is refused before
    // a lock is allocated for it; after that nothing happens until the lock is held.
    pub(super) fn with_creator_lock<T>(
        &self,
        creator: &CreatorId,
        f: impl FnOnce() -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        if self.store.key_supply(creator)?.is_none() {
            return Err(EngineError::CreatorNotFound(creator.clone()));
        }

        let lock = self.locks.handle(creator);
        let Some(_guard) = lock.try_lock_for(self.config.lock_timeout) else {
            tracing::warn!(
                creator = %creator,
                timeout_ms = self.config.lock_timeout.as_millis() as u64,
                "creator lock timed out"
            );
            return Err(EngineError::EngineBusy(creator.clone()));
        };
        f()
    }

    // 8.3: trade time never runs backwards within one creator's history
    pub(super) fn trade_time(&self, creator: &CreatorId) -> Result<Timestamp, EngineError> {
        let now = self.clock.now();
        Ok(match self.store.last_trade_at(creator)? {
            Some(last) if last > now => last,
            _ => now,
        })
    }
}
