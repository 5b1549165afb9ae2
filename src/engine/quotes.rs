// 8.4 engine/quotes.rs: pricing a trade against a supply. trades price exactly the
// same way under the creator lock; quotes do it lock-free as a preview.

use super::core::Engine;
use super::results::{EngineError, TradeQuote};
use crate::creator::Creator;
use crate::curve::average_price;
use crate::revenue;
use crate::types::{Amount, CreatorId, SharePercent, Side};

pub(super) fn ensure_quantity(quantity: u64) -> Result<(), EngineError> {
    if quantity == 0 {
        return Err(EngineError::InvalidQuantity(
            "quantity must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

// buy notional is split between creator and protocol in full
pub(super) fn price_buy(creator: &Creator, supply: u64, quantity: u64) -> Result<TradeQuote, EngineError> {
    ensure_quantity(quantity)?;
    let curve = &creator.curve;

    let total = curve.cost_to_buy(supply, quantity)?;
    let (unit_price_start, unit_price_end) = curve.buy_unit_prices(supply, quantity)?;
    let supply_after = supply.checked_add(quantity).ok_or(EngineError::Overflow)?;
    let split = revenue::split(total, creator.revenue_share);

    Ok(TradeQuote {
        creator_id: creator.id.clone(),
        side: Side::Buy,
        quantity,
        supply_before: supply,
        supply_after,
        unit_price_start,
        unit_price_end,
        total_notional: total,
        average_price: average_price(total, quantity),
        creator_share: split.creator_share,
        protocol_share: split.protocol_share,
        seller_proceeds: Amount::zero(),
        mark_after: curve.mark_price(supply_after)?,
    })
}

// sell proceeds go to the seller except for the configured fee, which is split
pub(super) fn price_sell(
    creator: &Creator,
    supply: u64,
    quantity: u64,
    sell_fee: SharePercent,
) -> Result<TradeQuote, EngineError> {
    ensure_quantity(quantity)?;
    let curve = &creator.curve;

    let total = curve.proceeds_from_sell(supply, quantity)?;
    let (unit_price_start, unit_price_end) = curve.sell_unit_prices(supply, quantity)?;
    let supply_after = supply - quantity;

    let fee = revenue::sell_fee(total, sell_fee);
    let split = revenue::split(fee, creator.revenue_share);
    let seller_proceeds = total.checked_sub(fee).ok_or(EngineError::Overflow)?;

    Ok(TradeQuote {
        creator_id: creator.id.clone(),
        side: Side::Sell,
        quantity,
        supply_before: supply,
        supply_after,
        unit_price_start,
        unit_price_end,
        total_notional: total,
        average_price: average_price(total, quantity),
        creator_share: split.creator_share,
        protocol_share: split.protocol_share,
        seller_proceeds,
        mark_after: curve.mark_price(supply_after)?,
    })
}

impl Engine {
    /// What buying `quantity` would cost right now. advisory: the supply may move
    /// before a matching `buy` runs, which is what `max_total_cost` guards.
    pub fn quote_buy(&self, creator_id: &CreatorId, quantity: u64) -> Result<TradeQuote, EngineError> {
        let (creator, supply) = self.read_key(creator_id)?;
        let quote = price_buy(&creator, supply, quantity)?;
        tracing::debug!(
            creator = %creator_id,
            quantity,
            total = %quote.total_notional,
            "buy quoted"
        );
        Ok(quote)
    }

    /// What selling `quantity` would return right now, after the sell fee.
    pub fn quote_sell(&self, creator_id: &CreatorId, quantity: u64) -> Result<TradeQuote, EngineError> {
        let (creator, supply) = self.read_key(creator_id)?;
        let quote = price_sell(&creator, supply, quantity, self.config.sell_fee)?;
        tracing::debug!(
            creator = %creator_id,
            quantity,
            proceeds = %quote.seller_proceeds,
            "sell quoted"
        );
        Ok(quote)
    }

    pub(super) fn read_key(&self, creator_id: &CreatorId) -> Result<(Creator, u64), EngineError> {
        let creator = self.creator(creator_id)?;
        let supply = self
            .store
            .key_supply(creator_id)?
            .ok_or_else(|| EngineError::CreatorNotFound(creator_id.clone()))?;
        Ok((creator, supply))
    }
}
