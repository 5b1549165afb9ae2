// 7.0: access gate for key-holder rooms. a user may enter a creator's room while
// they hold at least one of that creator's keys. every check reads the current
// holding; there is no cache to go stale after a sell.

use crate::creator::Creator;
use crate::store::{LedgerStore, StoreResult};
use crate::types::{CreatorId, UserId};

/// Unknown creators have no room, so the answer is `false` rather than an error.
pub fn has_access(store: &dyn LedgerStore, user: &UserId, creator: &CreatorId) -> StoreResult<bool> {
    Ok(store
        .holding(user, creator)?
        .is_some_and(|h| h.quantity > 0))
}

pub fn accessible_rooms(store: &dyn LedgerStore, user: &UserId) -> StoreResult<Vec<Creator>> {
    let mut rooms = Vec::new();
    for position in store.positions(user)? {
        if let Some(creator) = store.creator(&position.holding.creator_id)? {
            rooms.push(creator);
        }
    }
    Ok(rooms)
}
