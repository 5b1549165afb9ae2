// 8.0.2: quote type and errors for engine operations.

use crate::curve::CurveError;
use crate::holding::HoldingError;
use crate::portfolio::ValuationError;
use crate::store::StoreError;
use crate::trade::TradeDraft;
use crate::types::{Amount, CreatorId, Side, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Fully priced trade, before it is committed. Both quotes and trades are built from this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeQuote {
    pub creator_id: CreatorId,
    pub side: Side,
    pub quantity: u64,
    pub supply_before: u64,
    pub supply_after: u64,
    pub unit_price_start: Amount,
    pub unit_price_end: Amount,
    pub total_notional: Amount,
    pub average_price: Amount,
    pub creator_share: Amount,
    pub protocol_share: Amount,
    pub seller_proceeds: Amount,
    pub mark_after: Amount,
}

impl TradeQuote {
    pub(super) fn into_draft(self, user_id: UserId, timestamp: Timestamp) -> TradeDraft {
        TradeDraft {
            user_id,
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
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: u64, held: u64 },

    #[error("Supply cap reached: supply {supply} + {quantity} exceeds max {max_supply}")]
    SupplyExceeded {
        supply: u64,
        quantity: u64,
        max_supply: u64,
    },

    #[error("Slippage exceeded: cost {cost} above limit {max_total_cost}")]
    SlippageExceeded { cost: Amount, max_total_cost: Amount },

    #[error("Engine busy: could not lock creator {0} in time")]
    EngineBusy(CreatorId),

    #[error("Commit conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Creator {0} not found")]
    CreatorNotFound(CreatorId),

    #[error("Creator {0} already exists")]
    CreatorExists(CreatorId),

    #[error("User {0} is not an admin")]
    Unauthorized(UserId),

    #[error("Invalid revenue share {0}, must be 0 to 100")]
    InvalidRevenueShare(u8),

    #[error("Invalid curve: {0}")]
    InvalidCurve(String),

    #[error("Arithmetic overflow")]
    Overflow,
}

impl EngineError {
    /// HTTP-equivalent status for the presentation layer.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::InvalidQuantity(_)
            | EngineError::InvalidRevenueShare(_)
            | EngineError::InvalidCurve(_) => 400,
            EngineError::Unauthorized(_) => 403,
            EngineError::CreatorNotFound(_) => 404,
            EngineError::SupplyExceeded { .. }
            | EngineError::SlippageExceeded { .. }
            | EngineError::CreatorExists(_)
            | EngineError::Conflict(_) => 409,
            EngineError::InsufficientHoldings { .. } | EngineError::Overflow => 422,
            EngineError::StoreUnavailable(_) => 500,
            EngineError::EngineBusy(_) => 503,
        }
    }

    /// Whether the same request can simply be sent again. slippage needs a fresh quote
    /// first, so it is not counted here.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::EngineBusy(_) | EngineError::Conflict(_))
    }
}

impl From<CurveError> for EngineError {
    fn from(err: CurveError) -> Self {
        match err {
            CurveError::SupplyExceeded {
                supply,
                quantity,
                max_supply,
            } => EngineError::SupplyExceeded {
                supply,
                quantity,
                max_supply,
            },
            CurveError::InsufficientSupply { supply, quantity } => EngineError::InsufficientHoldings {
                requested: quantity,
                held: supply,
            },
            CurveError::Overflow => EngineError::Overflow,
            CurveError::InvalidCurve(reason) => EngineError::InvalidCurve(reason),
        }
    }
}

impl From<HoldingError> for EngineError {
    fn from(err: HoldingError) -> Self {
        match err {
            HoldingError::InsufficientHoldings { requested, held } => {
                EngineError::InsufficientHoldings { requested, held }
            }
            HoldingError::Overflow => EngineError::Overflow,
            e @ HoldingError::OrphanCostBasis(_) => EngineError::StoreUnavailable(e.to_string()),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) | StoreError::Corrupt(msg) => EngineError::StoreUnavailable(msg),
            StoreError::Conflict(msg) => EngineError::Conflict(msg),
            StoreError::UnknownCreator(id) => EngineError::CreatorNotFound(id),
            StoreError::DuplicateCreator(id) => EngineError::CreatorExists(id),
        }
    }
}

impl From<ValuationError> for EngineError {
    fn from(err: ValuationError) -> Self {
        match err {
            ValuationError::Store(e) => e.into(),
            ValuationError::Curve(e) => e.into(),
            ValuationError::Overflow => EngineError::Overflow,
        }
    }
}
