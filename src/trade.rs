// 5.0: trades are the audit trail. written once, never touched again.
// price history and traded volume are folds over this sequence, not separate state.

use crate::types::{Amount, CreatorId, SharePercent, Side, Timestamp, TradeId, UserId};
use serde::{Deserialize, Serialize};

/// A trade before the store has assigned its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeDraft {
    pub user_id: UserId,
    pub creator_id: CreatorId,
    pub side: Side,
    pub quantity: u64,
    pub unit_price_start: Amount,
    pub unit_price_end: Amount,
    pub total_notional: Amount,
    pub creator_share: Amount,
    pub protocol_share: Amount,
    pub seller_proceeds: Amount,
    pub supply_after: u64,
    pub mark_after: Amount,
    pub timestamp: Timestamp,
}

impl TradeDraft {
    pub fn into_trade(self, id: TradeId) -> Trade {
        Trade {
            id,
            user_id: self.user_id,
            creator_id: self.creator_id,
            side: self.side,
            quantity: self.quantity,
            unit_price_start: self.unit_price_start,
            unit_price_end: self.unit_price_end,
            total_notional: self.total_notional,
            creator_share: self.creator_share,
            protocol_share: self.protocol_share,
            seller_proceeds: self.seller_proceeds,
            supply_after: self.supply_after,
            mark_after: self.mark_after,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub user_id: UserId,
    pub creator_id: CreatorId,
    pub side: Side,
    pub quantity: u64,
    pub unit_price_start: Amount,
    pub unit_price_end: Amount,
    pub total_notional: Amount,
    pub creator_share: Amount,
    pub protocol_share: Amount,
    /// What the seller walks away with. always zero on buys.
    pub seller_proceeds: Amount,
    pub supply_after: u64,
    /// Curve mark at `supply_after`, the point this trade adds to price history.
    pub mark_after: Amount,
    pub timestamp: Timestamp,
}

impl Trade {
    pub fn average_price(&self) -> Amount {
        crate::curve::average_price(self.total_notional, self.quantity)
    }

    pub fn price_point(&self) -> PricePoint {
        PricePoint {
            timestamp: self.timestamp,
            price: self.mark_after,
            volume: self.quantity,
        }
    }
}

// 5.1: checked at the store boundary before anything is written
pub fn validate_draft(draft: &TradeDraft) -> Result<(), TradeError> {
    if draft.quantity == 0 {
        return Err(TradeError::ZeroQuantity);
    }
    if draft.side == Side::Buy && !draft.seller_proceeds.is_zero() {
        return Err(TradeError::BuyWithProceeds(draft.seller_proceeds));
    }
    let allocated = draft
        .creator_share
        .checked_add(draft.protocol_share)
        .and_then(|a| a.checked_add(draft.seller_proceeds));
    if allocated != Some(draft.total_notional) {
        return Err(TradeError::Unbalanced {
            total: draft.total_notional,
            creator: draft.creator_share,
            protocol: draft.protocol_share,
            seller: draft.seller_proceeds,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: Timestamp,
    pub price: Amount,
    pub volume: u64,
}

pub fn price_history(trades: &[Trade]) -> Vec<PricePoint> {
    trades.iter().map(Trade::price_point).collect()
}

// sum of absolute trade notional, both sides
pub fn total_volume(trades: &[Trade]) -> Amount {
    trades.iter().map(|t| t.total_notional).sum()
}

/// Audit row for an admin change to a creator's revenue share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueShareChange {
    pub creator_id: CreatorId,
    pub old_share: SharePercent,
    pub new_share: SharePercent,
    pub changed_by: UserId,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error("Trade quantity is zero")]
    ZeroQuantity,

    #[error("Buy carries seller proceeds {0}")]
    BuyWithProceeds(Amount),

    #[error("Trade does not balance: total {total} != creator {creator} + protocol {protocol} + seller {seller}")]
    Unbalanced {
        total: Amount,
        creator: Amount,
        protocol: Amount,
        seller: Amount,
    },
}
