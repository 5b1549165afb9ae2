// 6.0: one creator's slice of the ledger: profile, supply, holdings, trades, share audit log.
// pure data, no locking. the stores wrap each shard in its own RwLock.

use super::{PositionSnapshot, StoreError, StoreResult, TradeCommit};
use crate::creator::Creator;
use crate::holding::Holding;
use crate::trade::{validate_draft, RevenueShareChange, Trade};
use crate::types::{Side, TradeId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorShard {
    pub creator: Creator,
    pub total_supply: u64,
    pub holdings: BTreeMap<UserId, Holding>,
    pub trades: Vec<Trade>,
    pub share_log: Vec<RevenueShareChange>,
}

impl CreatorShard {
    pub fn new(creator: Creator) -> Self {
        Self {
            creator,
            total_supply: 0,
            holdings: BTreeMap::new(),
            trades: Vec::new(),
            share_log: Vec::new(),
        }
    }

    pub fn holder_count(&self) -> usize {
        self.holdings.values().filter(|h| !h.is_empty()).count()
    }

    pub fn position(&self, user: &UserId) -> Option<PositionSnapshot> {
        self.holdings
            .get(user)
            .filter(|h| !h.is_empty())
            .map(|h| PositionSnapshot {
                holding: h.clone(),
                curve: self.creator.curve,
                total_supply: self.total_supply,
            })
    }

    // 6.1: validates everything first, then mutates. an Err leaves the shard untouched.
    pub fn apply_trade(
        &mut self,
        commit: TradeCommit,
        next_id: impl FnOnce() -> TradeId,
    ) -> StoreResult<Trade> {
        self.check_commit(&commit)?;

        let TradeCommit { draft, holding, .. } = commit;
        let trade = draft.into_trade(next_id());

        self.total_supply = trade.supply_after;
        if holding.is_empty() {
            self.holdings.remove(&holding.user_id);
        } else {
            self.holdings.insert(holding.user_id.clone(), holding);
        }
        self.trades.push(trade.clone());

        Ok(trade)
    }

    fn check_commit(&self, commit: &TradeCommit) -> StoreResult<()> {
        let draft = &commit.draft;

        if draft.creator_id != self.creator.id || commit.holding.creator_id != self.creator.id {
            return Err(StoreError::Corrupt(format!(
                "commit for {} routed to shard {}",
                draft.creator_id, self.creator.id
            )));
        }
        if commit.holding.user_id != draft.user_id {
            return Err(StoreError::Corrupt(format!(
                "holding owner {} does not match trader {}",
                commit.holding.user_id, draft.user_id
            )));
        }

        if self.total_supply != commit.expected_supply {
            return Err(StoreError::Conflict(format!(
                "supply for {} is {}, commit expected {}",
                self.creator.id, self.total_supply, commit.expected_supply
            )));
        }
        let held = self
            .holdings
            .get(&draft.user_id)
            .map(|h| h.quantity)
            .unwrap_or(0);
        if held != commit.expected_quantity {
            return Err(StoreError::Conflict(format!(
                "holding of {} in {} is {}, commit expected {}",
                draft.user_id, self.creator.id, held, commit.expected_quantity
            )));
        }

        validate_draft(draft).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        commit
            .holding
            .validate()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let (supply_after, quantity_after) = match draft.side {
            Side::Buy => (
                commit.expected_supply.checked_add(draft.quantity),
                held.checked_add(draft.quantity),
            ),
            Side::Sell => (
                commit.expected_supply.checked_sub(draft.quantity),
                held.checked_sub(draft.quantity),
            ),
        };
        if supply_after != Some(draft.supply_after) {
            return Err(StoreError::Corrupt(format!(
                "{} of {} from supply {} cannot land at {}",
                draft.side, draft.quantity, commit.expected_supply, draft.supply_after
            )));
        }
        if quantity_after != Some(commit.holding.quantity) {
            return Err(StoreError::Corrupt(format!(
                "{} of {} from holding {} cannot land at {}",
                draft.side, draft.quantity, held, commit.holding.quantity
            )));
        }

        if let Some(last) = self.trades.last() {
            if draft.timestamp < last.timestamp {
                return Err(StoreError::Corrupt(format!(
                    "trade at {} precedes last trade at {}",
                    draft.timestamp.as_millis(),
                    last.timestamp.as_millis()
                )));
            }
        }

        Ok(())
    }

    pub fn apply_share_change(&mut self, change: RevenueShareChange) -> StoreResult<()> {
        if change.creator_id != self.creator.id {
            return Err(StoreError::Corrupt(format!(
                "share change for {} routed to shard {}",
                change.creator_id, self.creator.id
            )));
        }
        if change.old_share != self.creator.revenue_share {
            return Err(StoreError::Conflict(format!(
                "share for {} is {}, change expected {}",
                self.creator.id, self.creator.revenue_share, change.old_share
            )));
        }
        self.creator.revenue_share = change.new_share;
        self.share_log.push(change);
        Ok(())
    }

    // used when loading a snapshot from disk
    pub fn verify(&self) -> StoreResult<()> {
        let held: u64 = self.holdings.values().map(|h| h.quantity).sum();
        if held != self.total_supply {
            return Err(StoreError::Corrupt(format!(
                "holdings for {} sum to {} but supply is {}",
                self.creator.id, held, self.total_supply
            )));
        }
        for holding in self.holdings.values() {
            holding
                .validate()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        }
        if self.trades.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
            return Err(StoreError::Corrupt(format!(
                "trade history for {} is out of order",
                self.creator.id
            )));
        }
        Ok(())
    }
}
