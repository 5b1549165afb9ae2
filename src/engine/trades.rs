// 8.5 engine/trades.rs: buy and sell. each one reads supply and holding, prices, and
// commits, all under the creator lock. the store commit is the single point where
// the trade becomes final.

use super::core::Engine;
use super::quotes::{ensure_quantity, price_buy, price_sell};
use super::results::EngineError;
use crate::holding::Holding;
use crate::store::TradeCommit;
use crate::trade::Trade;
use crate::types::{Amount, CreatorId, UserId};

impl Engine {
    /// Buys `quantity` keys. fails with `SlippageExceeded` instead of paying more than
    /// `max_total_cost`.
    pub fn buy(
        &self,
        user: &UserId,
        creator_id: &CreatorId,
        quantity: u64,
        max_total_cost: Amount,
    ) -> Result<Trade, EngineError> {
        ensure_quantity(quantity)?;

        self.with_creator_lock(creator_id, || {
            let (creator, supply) = self.read_key(creator_id)?;
            let quote = price_buy(&creator, supply, quantity)?;

            if quote.total_notional > max_total_cost {
                tracing::info!(
                    user = %user,
                    creator = %creator_id,
                    cost = %quote.total_notional,
                    max_total_cost = %max_total_cost,
                    "buy refused on slippage"
                );
                return Err(EngineError::SlippageExceeded {
                    cost: quote.total_notional,
                    max_total_cost,
                });
            }

            let timestamp = self.trade_time(creator_id)?;
            let holding = self.current_holding(user, creator_id)?;
            let next = holding.apply_buy(quantity, quote.total_notional, timestamp)?;

            let commit = TradeCommit {
                draft: quote.into_draft(user.clone(), timestamp),
                expected_supply: supply,
                expected_quantity: holding.quantity,
                holding: next,
            };
            self.commit(commit)
        })
    }

    /// Sells `quantity` keys back to the curve at the positions just below supply.
    pub fn sell(&self, user: &UserId, creator_id: &CreatorId, quantity: u64) -> Result<Trade, EngineError> {
        ensure_quantity(quantity)?;

        self.with_creator_lock(creator_id, || {
            let (creator, supply) = self.read_key(creator_id)?;
            let holding = self.current_holding(user, creator_id)?;
            if quantity > holding.quantity {
                return Err(EngineError::InsufficientHoldings {
                    requested: quantity,
                    held: holding.quantity,
                });
            }

            let quote = price_sell(&creator, supply, quantity, self.config.sell_fee)?;
            let timestamp = self.trade_time(creator_id)?;
            let next = holding.apply_sell(quantity, timestamp)?;

            let commit = TradeCommit {
                draft: quote.into_draft(user.clone(), timestamp),
                expected_supply: supply,
                expected_quantity: holding.quantity,
                holding: next,
            };
            self.commit(commit)
        })
    }

    fn current_holding(&self, user: &UserId, creator_id: &CreatorId) -> Result<Holding, EngineError> {
        Ok(self
            .store
            .holding(user, creator_id)?
            .unwrap_or_else(|| Holding::empty(user.clone(), creator_id.clone(), self.clock.now())))
    }

    fn commit(&self, commit: TradeCommit) -> Result<Trade, EngineError> {
        let user = commit.draft.user_id.clone();
        let creator = commit.draft.creator_id.clone();

        let trade = self.store.commit_trade(commit).map_err(|e| {
            tracing::warn!(user = %user, creator = %creator, error = %e, "trade commit failed");
            EngineError::from(e)
        })?;

        tracing::info!(
            trade_id = trade.id.0,
            user = %trade.user_id,
            creator = %trade.creator_id,
            side = %trade.side,
            quantity = trade.quantity,
            notional = %trade.total_notional,
            supply_after = trade.supply_after,
            "trade committed"
        );
        Ok(trade)
    }
}
