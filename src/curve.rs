//! Linear bonding curve.
//!
//! The price of the unit at position `supply` is `base_price + price_increment * supply`.
//! Buying `q` units from supply `s` pays for positions `s..s+q`; selling `q` units
//! from supply `s` is paid for positions `s-q..s`. A buy followed by a sell of the
//! same size therefore nets to zero before fees.
//!
//! All sums are evaluated in closed form on integer minor units:
//!
//! ```text
//! cost(s, q) = q * base + inc * (q * s + q * (q - 1) / 2)
//! ```

use crate::types::Amount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveConfig {
    pub base_price: Amount,
    pub price_increment: Amount,
    pub max_supply: Option<u64>,
}

impl CurveConfig {
    pub fn new(base_price: Amount, price_increment: Amount, max_supply: Option<u64>) -> Self {
        Self {
            base_price,
            price_increment,
            max_supply,
        }
    }

    pub fn validate(&self) -> Result<(), CurveError> {
        if self.base_price.is_zero() {
            return Err(CurveError::InvalidCurve(
                "base price must be positive".to_string(),
            ));
        }
        if self.max_supply == Some(0) {
            return Err(CurveError::InvalidCurve(
                "max supply must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Price of the next unit when `supply` units are outstanding.
    pub fn price(&self, supply: u64) -> Result<Amount, CurveError> {
        if let Some(max) = self.max_supply {
            if supply >= max {
                return Err(CurveError::SupplyExceeded {
                    supply,
                    quantity: 1,
                    max_supply: max,
                });
            }
        }
        self.mark_price(supply)
    }

    /// Same line as [`price`](Self::price) without the cap check. Used for marks
    /// and displays, where a sold-out key still needs a value.
    pub fn mark_price(&self, supply: u64) -> Result<Amount, CurveError> {
        self.price_increment
            .checked_mul(u128::from(supply))
            .and_then(|step| self.base_price.checked_add(step))
            .ok_or(CurveError::Overflow)
    }

    pub fn cost_to_buy(&self, supply: u64, quantity: u64) -> Result<Amount, CurveError> {
        let end = supply.checked_add(quantity).ok_or(CurveError::Overflow)?;
        if let Some(max) = self.max_supply {
            if end > max {
                return Err(CurveError::SupplyExceeded {
                    supply,
                    quantity,
                    max_supply: max,
                });
            }
        }
        self.integral(supply, quantity)
    }

    pub fn proceeds_from_sell(&self, supply: u64, quantity: u64) -> Result<Amount, CurveError> {
        let start = supply
            .checked_sub(quantity)
            .ok_or(CurveError::InsufficientSupply { supply, quantity })?;
        self.integral(start, quantity)
    }

    /// (first unit, last unit) prices for a buy, in the order they are filled.
    pub fn buy_unit_prices(&self, supply: u64, quantity: u64) -> Result<(Amount, Amount), CurveError> {
        let last = supply
            .checked_add(quantity.saturating_sub(1))
            .ok_or(CurveError::Overflow)?;
        Ok((self.mark_price(supply)?, self.mark_price(last)?))
    }

    /// (first unit, last unit) prices for a sell. the first unit sold is the highest priced.
    pub fn sell_unit_prices(&self, supply: u64, quantity: u64) -> Result<(Amount, Amount), CurveError> {
        if quantity == 0 || quantity > supply {
            return Err(CurveError::InsufficientSupply { supply, quantity });
        }
        Ok((self.mark_price(supply - 1)?, self.mark_price(supply - quantity)?))
    }

    // sum of mark_price(start + i) for i in 0..quantity
    fn integral(&self, start: u64, quantity: u64) -> Result<Amount, CurveError> {
        let q = u128::from(quantity);
        let s = u128::from(start);

        // q * (q - 1) is always even
        let triangle = q.saturating_sub(1).checked_mul(q).ok_or(CurveError::Overflow)? / 2;
        let steps = q
            .checked_mul(s)
            .and_then(|qs| qs.checked_add(triangle))
            .ok_or(CurveError::Overflow)?;

        let base_part = self.base_price.checked_mul(q).ok_or(CurveError::Overflow)?;
        let slope_part = self
            .price_increment
            .checked_mul(steps)
            .ok_or(CurveError::Overflow)?;

        base_part.checked_add(slope_part).ok_or(CurveError::Overflow)
    }
}

/// Per-unit average of a trade, rounded down.
pub fn average_price(total: Amount, quantity: u64) -> Amount {
    if quantity == 0 {
        return Amount::zero();
    }
    Amount::new(total.value() / u128::from(quantity))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurveError {
    #[error("Supply cap reached: supply {supply} + {quantity} exceeds max {max_supply}")]
    SupplyExceeded {
        supply: u64,
        quantity: u64,
        max_supply: u64,
    },

    #[error("Cannot sell {quantity} from supply {supply}")]
    InsufficientSupply { supply: u64, quantity: u64 },

    #[error("Arithmetic overflow in curve evaluation")]
    Overflow,

    #[error("Invalid curve: {0}")]
    InvalidCurve(String),
}
