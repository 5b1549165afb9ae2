//! Engine configuration options.

use crate::types::{Denomination, SharePercent, UserId};
use std::collections::BTreeSet;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a trade waits for its creator's lock before failing with `EngineBusy`.
    pub lock_timeout: Duration,
    /// Fee taken from sell proceeds and run through the revenue split. zero disables it.
    pub sell_fee: SharePercent,
    /// Users allowed to change revenue shares.
    pub admins: BTreeSet<UserId>,
    /// Unit that request amounts are written in.
    pub denomination: Denomination,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(250),
            sell_fee: SharePercent::zero(),
            admins: BTreeSet::new(),
            denomination: Denomination::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_admin(mut self, admin: UserId) -> Self {
        self.admins.insert(admin);
        self
    }

    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }
}
