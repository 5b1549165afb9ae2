// 8.0.1: one mutex per creator key. every read-price-then-commit sequence on a key
// runs while holding it; trades on different keys take different mutexes.

use crate::types::CreatorId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub(super) struct KeyLocks {
    locks: Mutex<HashMap<CreatorId, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub(super) fn handle(&self, creator: &CreatorId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(creator.clone())
            .or_default()
            .clone()
    }
}
