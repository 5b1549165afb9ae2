// 3.0: revenue split between creator and protocol.
// creator gets floor(total * pct / 100), protocol takes the remainder, so the
// two always sum back to the input exactly.

use crate::types::{Amount, SharePercent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub creator_share: Amount,
    pub protocol_share: Amount,
}

impl RevenueSplit {
    pub fn none() -> Self {
        Self {
            creator_share: Amount::zero(),
            protocol_share: Amount::zero(),
        }
    }

    pub fn total(&self) -> Amount {
        // both halves came out of one Amount, so this cannot overflow
        Amount::new(self.creator_share.value() + self.protocol_share.value())
    }
}

pub fn split(total_notional: Amount, share: SharePercent) -> RevenueSplit {
    // mul by <= 100 then div by 100: only overflows for totals above u128::MAX / 100,
    // where the creator share falls back to the division-first form
    let creator_share = total_notional
        .mul_div_floor(u128::from(share.value()), 100)
        .unwrap_or_else(|| {
            let whole = total_notional.value() / 100 * u128::from(share.value());
            let part = total_notional.value() % 100 * u128::from(share.value()) / 100;
            Amount::new(whole + part)
        });
    let protocol_share = total_notional.saturating_sub(creator_share);

    RevenueSplit {
        creator_share,
        protocol_share,
    }
}

// 3.1: sell fee. proceeds * pct / 100, floored. zero percent means sells carry no fee.
pub fn sell_fee(proceeds: Amount, fee: SharePercent) -> Amount {
    split(proceeds, fee).creator_share
}
