//! Portfolio valuation.
//!
//! Holdings are marked to the curve: each unit is worth the current marginal
//! price `price(total_supply)`, not what selling would realize. Actually selling
//! walks down the curve and returns less; that figure is reported separately as
//! `exit_value` (before any sell fee).
//!
//! Every position is valued from a [`PositionSnapshot`], which pairs a holding
//! with the supply it was read alongside, so a valuation never mixes states
//! from two different trades on the same key.

use crate::curve::CurveError;
use crate::store::{LedgerStore, PositionSnapshot, StoreError};
use crate::types::{Amount, CreatorId, SignedAmount, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionValue {
    pub creator_id: CreatorId,
    pub quantity: u64,
    pub mark_price: Amount,
    pub current_value: Amount,
    pub cost_basis: Amount,
    pub profit_loss: SignedAmount,
    pub average_cost: Amount,
    pub exit_value: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub user_id: UserId,
    pub positions: Vec<PositionValue>,
    pub keys_held: u64,
    pub current_value: Amount,
    pub cost_basis: Amount,
    pub profit_loss: SignedAmount,
}

impl Portfolio {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            positions: Vec::new(),
            keys_held: 0,
            current_value: Amount::zero(),
            cost_basis: Amount::zero(),
            profit_loss: SignedAmount::zero(),
        }
    }

    pub fn position(&self, creator: &CreatorId) -> Option<&PositionValue> {
        self.positions.iter().find(|p| &p.creator_id == creator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValuationError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Curve error: {0}")]
    Curve(#[from] CurveError),

    #[error("Valuation overflow")]
    Overflow,
}

pub fn value_position(snapshot: &PositionSnapshot) -> Result<PositionValue, ValuationError> {
    let holding = &snapshot.holding;
    let mark_price = snapshot.curve.mark_price(snapshot.total_supply)?;
    let current_value = mark_price
        .checked_mul(u128::from(holding.quantity))
        .ok_or(ValuationError::Overflow)?;
    let profit_loss = current_value
        .signed_sub(holding.cost_basis)
        .ok_or(ValuationError::Overflow)?;
    let exit_value = snapshot
        .curve
        .proceeds_from_sell(snapshot.total_supply, holding.quantity)?;

    Ok(PositionValue {
        creator_id: holding.creator_id.clone(),
        quantity: holding.quantity,
        mark_price,
        current_value,
        cost_basis: holding.cost_basis,
        profit_loss,
        average_cost: holding.average_cost(),
        exit_value,
    })
}

pub fn valuation(store: &dyn LedgerStore, user: &UserId) -> Result<Portfolio, ValuationError> {
    let mut portfolio = Portfolio::empty(user.clone());

    for snapshot in store.positions(user)? {
        let position = value_position(&snapshot)?;
        portfolio.keys_held = portfolio
            .keys_held
            .checked_add(position.quantity)
            .ok_or(ValuationError::Overflow)?;
        portfolio.current_value = portfolio
            .current_value
            .checked_add(position.current_value)
            .ok_or(ValuationError::Overflow)?;
        portfolio.cost_basis = portfolio
            .cost_basis
            .checked_add(position.cost_basis)
            .ok_or(ValuationError::Overflow)?;
        portfolio.positions.push(position);
    }

    portfolio.profit_loss = portfolio
        .current_value
        .signed_sub(portfolio.cost_basis)
        .ok_or(ValuationError::Overflow)?;
    Ok(portfolio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveConfig;
    use crate::holding::Holding;
    use crate::types::Timestamp;

    fn snapshot(quantity: u64, cost_basis: u128, supply: u64) -> PositionSnapshot {
        PositionSnapshot {
            holding: Holding {
                user_id: UserId::new("bob"),
                creator_id: CreatorId::new("alice"),
                quantity,
                cost_basis: Amount::new(cost_basis),
                updated_at: Timestamp::from_millis(0),
            },
            curve: CurveConfig::new(Amount::new(1_000), Amount::new(100), None),
            total_supply: supply,
        }
    }

    #[test]
    fn marked_to_curve_not_exit() {
        // bought 3 from 0 for 3300, nobody else traded
        let p = value_position(&snapshot(3, 3_300, 3)).unwrap();
        assert_eq!(p.mark_price, Amount::new(1_300));
        assert_eq!(p.current_value, Amount::new(3_900));
        assert_eq!(p.profit_loss, SignedAmount::new(600));
        assert_eq!(p.exit_value, Amount::new(3_300));
        assert_eq!(p.average_cost, Amount::new(1_100));
    }

    #[test]
    fn loss_is_negative() {
        // bought high, supply since fell to the holder's own 2 units
        let p = value_position(&snapshot(2, 5_000, 2)).unwrap();
        assert_eq!(p.current_value, Amount::new(2_400));
        assert_eq!(p.profit_loss, SignedAmount::new(-2_600));
        assert!(p.profit_loss.is_negative());
    }

    #[test]
    fn empty_portfolio_is_all_zero() {
        let store = crate::store::MemoryStore::new();
        let p = valuation(&store, &UserId::new("nobody")).unwrap();
        assert_eq!(p, Portfolio::empty(UserId::new("nobody")));
    }
}
