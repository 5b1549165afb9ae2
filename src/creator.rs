//! Creator profiles and the read view of their key.
//!
//! A creator and its key are created together at onboarding. After that only
//! `revenue_share` changes, and only through the audited admin path. The
//! key itself has no stored price: `current_price` in [`KeyView`] is always
//! recomputed from supply.

use crate::curve::{CurveConfig, CurveError};
use crate::trade::{price_history, total_volume, PricePoint, Trade};
use crate::types::{Amount, CreatorId, SharePercent, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub id: CreatorId,
    pub username: String,
    pub chat_room_name: String,
    pub chat_room_description: String,
    pub curve: CurveConfig,
    pub revenue_share: SharePercent,
    pub created_at: Timestamp,
}

impl Creator {
    pub fn new(id: CreatorId, username: impl Into<String>, curve: CurveConfig, revenue_share: SharePercent) -> Self {
        let username = username.into();
        Self {
            chat_room_name: format!("{username}'s room"),
            chat_room_description: String::new(),
            id,
            username,
            curve,
            revenue_share,
            created_at: Timestamp::from_millis(0),
        }
    }

    pub fn with_room(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.chat_room_name = name.into();
        self.chat_room_description = description.into();
        self
    }

    pub fn validate(&self) -> Result<(), CreatorError> {
        if self.id.as_str().trim().is_empty() {
            return Err(CreatorError::EmptyId);
        }
        self.curve.validate()?;
        Ok(())
    }
}

/// Everything `GET /keys/:creatorId` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyView {
    pub creator_id: CreatorId,
    pub total_supply: u64,
    pub current_price: Amount,
    pub total_volume_traded: Amount,
    pub holder_count: usize,
    pub sold_out: bool,
    pub price_history: Vec<PricePoint>,
}

impl KeyView {
    pub fn derive(
        creator: &Creator,
        total_supply: u64,
        trades: &[Trade],
        holder_count: usize,
    ) -> Result<Self, CurveError> {
        let sold_out = creator
            .curve
            .max_supply
            .is_some_and(|max| total_supply >= max);

        Ok(Self {
            creator_id: creator.id.clone(),
            total_supply,
            current_price: creator.curve.mark_price(total_supply)?,
            total_volume_traded: total_volume(trades),
            holder_count,
            sold_out,
            price_history: price_history(trades),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreatorError {
    #[error("Creator id is empty")]
    EmptyId,

    #[error("Curve error: {0}")]
    Curve(#[from] CurveError),
}
