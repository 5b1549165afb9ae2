// 8.6 engine/admin.rs: revenue share changes. admin only, taken under the creator
// lock so no trade splits against a half-applied share.

use super::core::Engine;
use super::results::EngineError;
use crate::trade::RevenueShareChange;
use crate::types::{CreatorId, SharePercent, UserId};

impl Engine {
    pub fn update_revenue_share(
        &self,
        admin: &UserId,
        creator_id: &CreatorId,
        percent: u8,
    ) -> Result<RevenueShareChange, EngineError> {
        if !self.config.is_admin(admin) {
            tracing::warn!(user = %admin, creator = %creator_id, "revenue share change refused");
            return Err(EngineError::Unauthorized(admin.clone()));
        }
        let new_share = SharePercent::new(percent).ok_or(EngineError::InvalidRevenueShare(percent))?;

        self.with_creator_lock(creator_id, || {
            let creator = self.creator(creator_id)?;
            let change = RevenueShareChange {
                creator_id: creator_id.clone(),
                old_share: creator.revenue_share,
                new_share,
                changed_by: admin.clone(),
                timestamp: self.clock.now(),
            };
            self.store.set_revenue_share(change.clone())?;

            tracing::info!(
                admin = %admin,
                creator = %creator_id,
                old_share = %change.old_share,
                new_share = %change.new_share,
                "revenue share changed"
            );
            Ok(change)
        })
    }
}
