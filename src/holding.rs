// 4.0: a user's stake in one creator's key. quantity plus what was paid for it.
// a holding at quantity 0 is logically absent, so its cost basis must be 0 too.

use crate::types::{Amount, CreatorId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub user_id: UserId,
    pub creator_id: CreatorId,
    pub quantity: u64,
    pub cost_basis: Amount,
    pub updated_at: Timestamp,
}

impl Holding {
    pub fn empty(user_id: UserId, creator_id: CreatorId, timestamp: Timestamp) -> Self {
        Self {
            user_id,
            creator_id,
            quantity: 0,
            cost_basis: Amount::zero(),
            updated_at: timestamp,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    pub fn validate(&self) -> Result<(), HoldingError> {
        if self.quantity == 0 && !self.cost_basis.is_zero() {
            return Err(HoldingError::OrphanCostBasis(self.cost_basis));
        }
        Ok(())
    }

    pub fn average_cost(&self) -> Amount {
        crate::curve::average_price(self.cost_basis, self.quantity)
    }

    // 4.1: buy adds units and their full cost
    pub fn apply_buy(&self, quantity: u64, cost: Amount, timestamp: Timestamp) -> Result<Holding, HoldingError> {
        let new_quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or(HoldingError::Overflow)?;
        let new_basis = self
            .cost_basis
            .checked_add(cost)
            .ok_or(HoldingError::Overflow)?;

        Ok(Holding {
            user_id: self.user_id.clone(),
            creator_id: self.creator_id.clone(),
            quantity: new_quantity,
            cost_basis: new_basis,
            updated_at: timestamp,
        })
    }

    // 4.2: sell removes units and a proportional slice of basis.
    // basis -= basis * q / old_q, floored. selling everything zeroes the basis exactly.
    pub fn apply_sell(&self, quantity: u64, timestamp: Timestamp) -> Result<Holding, HoldingError> {
        if quantity > self.quantity {
            return Err(HoldingError::InsufficientHoldings {
                requested: quantity,
                held: self.quantity,
            });
        }

        let new_quantity = self.quantity - quantity;
        let new_basis = if new_quantity == 0 {
            Amount::zero()
        } else {
            let released = released_basis(self.cost_basis, quantity, self.quantity)?;
            self.cost_basis.saturating_sub(released)
        };

        Ok(Holding {
            user_id: self.user_id.clone(),
            creator_id: self.creator_id.clone(),
            quantity: new_quantity,
            cost_basis: new_basis,
            updated_at: timestamp,
        })
    }
}

// floor(basis * sold / held) without forming basis * sold. sold < held, so the
// quotient term is at most basis and the remainder term is below u64::MAX squared
fn released_basis(basis: Amount, sold: u64, held: u64) -> Result<Amount, HoldingError> {
    if held == 0 {
        return Err(HoldingError::Overflow);
    }
    let (basis, sold, held) = (basis.value(), u128::from(sold), u128::from(held));
    let whole = (basis / held).checked_mul(sold).ok_or(HoldingError::Overflow)?;
    let part = (basis % held) * sold / held;
    whole
        .checked_add(part)
        .map(Amount::new)
        .ok_or(HoldingError::Overflow)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HoldingError {
    #[error("Insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: u64, held: u64 },

    #[error("Empty holding carries cost basis {0}")]
    OrphanCostBasis(Amount),

    #[error("Holding arithmetic overflow")]
    Overflow,
}
